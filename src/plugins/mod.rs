pub mod extractors;
pub mod manager;
pub mod notifiers;
pub mod traits;

pub use manager::{Delivery, PluginManager};
pub use traits::{ExtractionRule, NotifierPlugin};
