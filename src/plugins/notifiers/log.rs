use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::AlertEvent;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;

/// Writes alerts to the log. Registered when no webhook is configured.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &str {
        "Log Notifier"
    }

    fn plugin_type(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult, AppError> {
        let previous = event
            .previous_price
            .map(|p| format!("${:.2}", p))
            .unwrap_or_else(|| "N/A".to_string());

        info!(
            "[ALERT] {} ({}, {}): {} -> ${:.2} ({:.1}% off) - {}",
            event.target_name, event.trigger, event.severity, previous, event.new_price, event.drop_percent, event.url
        );

        Ok(NotificationResult {
            success: true,
            message_id: None,
            error: None,
        })
    }

    async fn test_connection(&self) -> Result<bool, AppError> {
        warn!("No webhook configured; alerts are only written to the log");
        Ok(true)
    }
}
