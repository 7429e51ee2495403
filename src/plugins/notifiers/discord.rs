use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::config::DiscordConfig;
use crate::models::{AlertEvent, Severity, Target, TriggerKind};
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, ConfigError};

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self, AppError> {
        let webhook_url = config
            .webhook_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEndpoint("Discord webhook URL is not set".into()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(DiscordNotifier {
            client,
            webhook_url,
            username: config.username.clone(),
        })
    }

    fn get_emoji(&self, trigger: TriggerKind) -> &str {
        match trigger {
            TriggerKind::BelowTarget => "🎯",
            TriggerKind::FlashSale => "⚡",
        }
    }

    fn format_price(price: Decimal) -> String {
        format!("${:.2}", price)
    }

    fn create_embed(&self, event: &AlertEvent) -> serde_json::Value {
        let old_price = event
            .previous_price
            .map(Self::format_price)
            .unwrap_or_else(|| "N/A".to_string());

        json!({
            "title": format!("🔔 Price Alert: {}", event.target_name),
            "url": event.url,
            "color": event.severity.color(),
            "timestamp": event.detected_at.to_rfc3339(),
            "fields": [
                {
                    "name": "💰 Old Price",
                    "value": old_price,
                    "inline": true
                },
                {
                    "name": "🏷️ New Price",
                    "value": format!("**{}**", Self::format_price(event.new_price)),
                    "inline": true
                },
                {
                    "name": "📉 Discount",
                    "value": format!("**{:.1}%** off", event.drop_percent),
                    "inline": true
                },
                {
                    "name": format!("{} Trigger", self.get_emoji(event.trigger)),
                    "value": event.trigger.to_string(),
                    "inline": true
                },
                {
                    "name": "🎯 Target Price",
                    "value": Self::format_price(event.target_price),
                    "inline": true
                }
            ],
            "footer": {
                "text": format!("Price Monitor • Severity: {} • Click title to view product", event.severity)
            }
        })
    }

    fn create_webhook_payload(&self, event: &AlertEvent) -> serde_json::Value {
        json!({
            "username": self.username,
            "embeds": [self.create_embed(event)]
        })
    }
}

/// Synthetic alert used to verify webhook connectivity.
pub fn sample_alert() -> AlertEvent {
    let target = Target::new(
        "🧪 Test Product",
        "https://example.com/test-product",
        Decimal::new(7500, 2),
    );
    AlertEvent::new(
        &target,
        TriggerKind::FlashSale,
        Some(Decimal::new(10000, 2)),
        Decimal::new(4999, 2),
        Severity::Critical,
        Utc::now(),
    )
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult, AppError> {
        let payload = self.create_webhook_payload(event);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notifier {
                notifier: self.plugin_type().to_string(),
                message: format!("webhook returned {}: {}", status, body),
            });
        }

        info!("Discord alert sent for {}", event.target_name);
        Ok(NotificationResult {
            success: true,
            message_id: Some(event.id.to_string()),
            error: None,
        })
    }

    async fn test_connection(&self) -> Result<bool, AppError> {
        let result = self.notify(&sample_alert()).await?;
        Ok(result.success)
    }
}
