pub mod notifier;
pub mod rule;

pub use notifier::{NotificationResult, NotifierPlugin};
pub use rule::{ExtractionRule, Page, PriceBounds, RuleOutcome};
