use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::Target;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    BelowTarget,
    FlashSale,
}

/// Urgency tier, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub id: Uuid,
    pub target_name: String,
    pub url: String,
    pub target_price: Decimal,
    pub trigger: TriggerKind,
    pub previous_price: Option<Decimal>,
    pub new_price: Decimal,
    /// Percentage drop, positive when the price fell.
    pub drop_percent: Decimal,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

impl Severity {
    pub fn from_drop_percent(drop_percent: Decimal) -> Self {
        if drop_percent >= Decimal::from(50) {
            Severity::Critical
        } else if drop_percent >= Decimal::from(40) {
            Severity::High
        } else if drop_percent >= Decimal::from(20) {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    /// Embed colour used by chat notifiers.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Critical => 0xFF0000,
            Severity::High => 0xFF6600,
            Severity::Moderate => 0xFFCC00,
            Severity::Low => 0x00CC00,
        }
    }
}

impl AlertEvent {
    pub fn new(
        target: &Target,
        trigger: TriggerKind,
        previous_price: Option<Decimal>,
        new_price: Decimal,
        severity: Severity,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_name: target.name.clone(),
            url: target.url.clone(),
            target_price: target.target_price,
            trigger,
            previous_price,
            new_price,
            drop_percent: drop_percent(previous_price, target.target_price, new_price),
            severity,
            detected_at,
        }
    }
}

/// Drop relative to the previous observation, or to the target price when there is none.
pub fn drop_percent(previous: Option<Decimal>, target_price: Decimal, price: Decimal) -> Decimal {
    let reference = previous.unwrap_or(target_price);
    if reference.is_zero() {
        return Decimal::ZERO;
    }
    ((reference - price) / reference * Decimal::from(100)).round_dp(2)
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::BelowTarget => write!(f, "below target"),
            TriggerKind::FlashSale => write!(f, "flash sale"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Moderate => "MODERATE",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}
