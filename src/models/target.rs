use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

use crate::utils::error::{AppError, ConfigError};

/// A monitored product as configured by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub target_price: Decimal,
    /// Site profile name; when absent the profile is chosen from the URL host.
    #[serde(default)]
    pub category: Option<String>,
}

/// Observed state for one target, keyed by URL in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetState {
    pub last_price: Option<Decimal>,
    pub last_checked: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>, target_price: Decimal) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            target_price,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_price <= Decimal::ZERO {
            return Err(ConfigError::InvalidPrice {
                name: self.name.clone(),
                price: self.target_price,
            });
        }

        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::InvalidUrl {
                name: self.name.clone(),
                url: self.url.clone(),
            }),
        }
    }
}

impl TargetState {
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if until > now)
    }

    pub(crate) fn record_success(&mut self, price: Decimal, now: DateTime<Utc>) {
        self.last_price = Some(price);
        self.last_checked = Some(now);
        self.consecutive_failures = 0;
        self.cooldown_until = None;
    }

    pub(crate) fn record_failure(&mut self, now: DateTime<Utc>) {
        self.last_checked = Some(now);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Saturates at the latest representable instant instead of overflowing.
    pub(crate) fn enter_cooldown(&mut self, now: DateTime<Utc>, duration: chrono::Duration) {
        self.cooldown_until = Some(now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    /// Drops a cooldown that has already elapsed.
    pub(crate) fn clear_expired_cooldown(&mut self, now: DateTime<Utc>) -> bool {
        match self.cooldown_until {
            Some(until) if until <= now => {
                self.cooldown_until = None;
                true
            }
            _ => false,
        }
    }
}

/// Validates a full target list: non-empty, positive prices, parseable URLs, no duplicates.
pub fn validate_targets(targets: &[Target]) -> Result<(), ConfigError> {
    if targets.is_empty() {
        return Err(ConfigError::EmptyTargetList);
    }

    let mut seen = HashSet::new();
    for target in targets {
        target.validate()?;
        if !seen.insert(target.url.as_str()) {
            return Err(ConfigError::DuplicateTarget {
                url: target.url.clone(),
            });
        }
    }

    Ok(())
}

pub fn parse_targets(json: &str) -> Result<Vec<Target>, AppError> {
    let targets: Vec<Target> = serde_json::from_str(json)?;
    validate_targets(&targets)?;
    Ok(targets)
}

pub fn load_targets(path: &Path) -> Result<Vec<Target>, AppError> {
    let content = std::fs::read_to_string(path)?;
    parse_targets(&content)
}
