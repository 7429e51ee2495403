use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::utils::error::{AppError, ConfigError};

/// Longest accepted cooldown: one week.
pub const MAX_COOLDOWN_MINUTES: u64 = 7 * 24 * 60;
/// Longest accepted interval, jitter or minimum delay: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub scraper: ScraperConfig,
    pub extraction: ExtractionConfig,
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub jitter_secs: u64,
    pub min_delay_secs: u64,
    pub cooldown_minutes: u64,
    pub flash_sale_threshold: Decimal,
    /// Consecutive non-blocked failures before a target cools down. Unset disables escalation.
    #[serde(default)]
    pub failure_cooldown_threshold: Option<u32>,
    pub target_timeout_secs: u64,
    pub reload_targets: bool,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub request_timeout_secs: u64,
    pub render_fallback: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
    pub render_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub min_price: Decimal,
    pub max_price: Decimal,
    #[serde(default)]
    pub profiles_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Clamped to `MAX_COOLDOWN_MINUTES`.
    pub fn cooldown(&self) -> chrono::Duration {
        let minutes = self.cooldown_minutes.min(MAX_COOLDOWN_MINUTES);
        i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or_else(chrono::Duration::zero)
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_secs)
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            jitter_secs: 15,
            min_delay_secs: 5,
            cooldown_minutes: 30,
            flash_sale_threshold: Decimal::new(40, 2),
            failure_cooldown_threshold: None,
            target_timeout_secs: 120,
            reload_targets: false,
            state_file: None,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            render_fallback: true,
            chrome_path: None,
            render_wait_ms: 3000,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_price: Decimal::ONE,
            max_price: Decimal::new(100_000, 0),
            profiles_file: None,
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Price Monitor".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            scraper: ScraperConfig::default(),
            extraction: ExtractionConfig::default(),
            notifications: NotificationsConfig {
                discord: DiscordConfig::default(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layers built-in defaults, `config/default`, `config/local` and `PRICEWATCH__*` variables.
    pub fn from_env() -> Result<Self, AppError> {
        let s = Config::builder()
            .set_default("monitor.interval_secs", 60)?
            .set_default("monitor.jitter_secs", 15)?
            .set_default("monitor.min_delay_secs", 5)?
            .set_default("monitor.cooldown_minutes", 30)?
            .set_default("monitor.flash_sale_threshold", 0.40)?
            .set_default("monitor.target_timeout_secs", 120)?
            .set_default("monitor.reload_targets", false)?
            .set_default("scraper.request_timeout_secs", 30)?
            .set_default("scraper.render_fallback", true)?
            .set_default("scraper.render_wait_ms", 3000)?
            .set_default("extraction.min_price", 1.0)?
            .set_default("extraction.max_price", 100000.0)?
            .set_default("notifications.discord.username", "Price Monitor")?
            .add_source(File::with_name("config/default").required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env();
        Ok(config)
    }

    /// Fills unset values from the plain variable names older deployments export.
    fn apply_legacy_env(&mut self) {
        if self.notifications.discord.webhook_url.is_none() {
            self.notifications.discord.webhook_url =
                env::var("DISCORD_WEBHOOK_URL").ok().filter(|v| !v.is_empty());
        }

        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        if env::var("PRICEWATCH__MONITOR__INTERVAL_SECS").is_err() {
            if let Some(secs) = env::var("CHECK_INTERVAL").ok().and_then(|v| v.parse().ok()) {
                self.monitor.interval_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;

        if monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "monitor.interval_secs must be greater than 0".into(),
            ));
        }

        if monitor.cooldown_minutes == 0 {
            return Err(ConfigError::InvalidSetting(
                "monitor.cooldown_minutes must be greater than 0".into(),
            ));
        }

        if monitor.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(ConfigError::InvalidSetting(format!(
                "monitor.cooldown_minutes must be at most {}",
                MAX_COOLDOWN_MINUTES
            )));
        }

        for (key, value) in [
            ("monitor.interval_secs", monitor.interval_secs),
            ("monitor.jitter_secs", monitor.jitter_secs),
            ("monitor.min_delay_secs", monitor.min_delay_secs),
            ("monitor.target_timeout_secs", monitor.target_timeout_secs),
        ] {
            if value > MAX_INTERVAL_SECS {
                return Err(ConfigError::InvalidSetting(format!(
                    "{} must be at most {}",
                    key, MAX_INTERVAL_SECS
                )));
            }
        }

        if monitor.flash_sale_threshold <= Decimal::ZERO || monitor.flash_sale_threshold >= Decimal::ONE {
            return Err(ConfigError::InvalidSetting(
                "monitor.flash_sale_threshold must be between 0 and 1 (exclusive)".into(),
            ));
        }

        if monitor.failure_cooldown_threshold == Some(0) {
            return Err(ConfigError::InvalidSetting(
                "monitor.failure_cooldown_threshold must be at least 1 when set".into(),
            ));
        }

        if monitor.target_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "monitor.target_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.scraper.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "scraper.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.extraction.min_price <= Decimal::ZERO {
            return Err(ConfigError::InvalidSetting(
                "extraction.min_price must be positive".into(),
            ));
        }

        if self.extraction.min_price >= self.extraction.max_price {
            return Err(ConfigError::InvalidSetting(
                "extraction.min_price must be below extraction.max_price".into(),
            ));
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            if Url::parse(webhook).is_err() {
                return Err(ConfigError::MissingEndpoint(format!(
                    "webhook URL '{}' is not a valid URL",
                    webhook
                )));
            }
        }

        Ok(())
    }
}
