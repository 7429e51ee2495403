use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Profile file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notifier error: {notifier}: {message}")]
    Notifier { notifier: String, message: String },
}

/// Outcome of a single page retrieval that did not produce a usable body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,

    #[error("blocked by site (HTTP {0})")]
    Blocked(u16),

    #[error("page not found (HTTP 404)")]
    NotFound,

    #[error("server error (HTTP {0})")]
    ServerError(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("matched value could not be parsed: {0}")]
    ParseError(String),

    #[error("rendering unavailable: {0}")]
    RenderUnavailable(String),
}

/// Startup-fatal problems with the target list or settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target list is empty")]
    EmptyTargetList,

    #[error("target '{name}' has invalid target price {price}")]
    InvalidPrice { name: String, price: Decimal },

    #[error("notification endpoint is missing or invalid: {0}")]
    MissingEndpoint(String),

    #[error("target '{name}' has invalid URL '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("URL '{url}' is configured more than once")]
    DuplicateTarget { url: String },

    #[error("site profile '{profile}' has invalid rule '{rule}': {message}")]
    InvalidPattern {
        profile: String,
        rule: String,
        message: String,
    },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
