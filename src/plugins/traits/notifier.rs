use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::AlertEvent;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// Trait for alert delivery methods (Discord webhook, log output, ...)
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    /// Formats and delivers one alert.
    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult, AppError>;

    /// Sends a synthetic alert to verify the endpoint is reachable.
    async fn test_connection(&self) -> Result<bool, AppError>;
}
