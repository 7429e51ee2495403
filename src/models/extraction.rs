use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pass over the page produced a price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionTier {
    /// Rules applied to the fetched markup.
    Static,
    /// Rules applied to the browser-rendered DOM.
    Rendered,
}

/// Classified outcome of checking one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success {
        price: Decimal,
        tier: ExtractionTier,
        rule: String,
    },
    NotFound {
        attempts: Vec<String>,
    },
    Blocked {
        reason: String,
    },
    RenderRequired {
        reason: String,
    },
    Error {
        reason: String,
    },
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionTier::Static => write!(f, "static"),
            ExtractionTier::Rendered => write!(f, "rendered"),
        }
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionResult::Success { price, tier, rule } => {
                write!(f, "${:.2} ({} via {})", price, tier, rule)
            }
            ExtractionResult::NotFound { attempts } if attempts.is_empty() => {
                write!(f, "not found")
            }
            ExtractionResult::NotFound { attempts } => {
                write!(f, "not found ({} rules tried)", attempts.len())
            }
            ExtractionResult::Blocked { reason } => write!(f, "blocked: {}", reason),
            ExtractionResult::RenderRequired { reason } => {
                write!(f, "render required: {}", reason)
            }
            ExtractionResult::Error { reason } => write!(f, "error: {}", reason),
        }
    }
}
