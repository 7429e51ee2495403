// Extraction rule implementations
pub mod pattern;
pub mod price;
pub mod selector;

pub use pattern::PatternRule;
pub use price::normalize_price;
pub use selector::SelectorRule;
