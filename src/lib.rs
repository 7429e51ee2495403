pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod plugins;
pub mod renderer;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use extractor::Extractor;
pub use fetcher::{Fetcher, HttpFetcher, RawContent};
pub use monitor::{CycleReport, Monitor, TargetOutcome, TargetReport};
pub use store::TargetStore;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
