use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::traits::{NotificationResult, NotifierPlugin};
use crate::models::AlertEvent;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Outcome of delivering one alert through one notifier.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notifier: String,
    pub result: Result<NotificationResult, String>,
}

impl Delivery {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(r) if r.success)
    }
}

#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<BTreeMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Register a notifier plugin, replacing any with the same type
    pub async fn register_notifier(&self, plugin: NotifierPluginBox) {
        let plugin_type = plugin.plugin_type().to_string();
        debug!("Registering notifier {}", plugin_type);
        let mut notifiers = self.notifiers.write().await;
        notifiers.insert(plugin_type, plugin);
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        notifiers.keys().cloned().collect()
    }

    /// Deliver every event through every registered notifier.
    ///
    /// Failures are logged and reported back; they never abort the batch.
    pub async fn dispatch(&self, events: &[AlertEvent]) -> Vec<Delivery> {
        if events.is_empty() {
            return Vec::new();
        }

        let notifiers = self.notifiers.read().await;
        let mut pending = Vec::with_capacity(events.len() * notifiers.len());
        for event in events {
            for (plugin_type, notifier) in notifiers.iter() {
                pending.push(async move {
                    let result = notifier.notify(event).await.map_err(|e| e.to_string());
                    if let Err(e) = &result {
                        warn!("Notifier {} failed for {}: {}", plugin_type, event.target_name, e);
                    }
                    Delivery {
                        notifier: plugin_type.clone(),
                        result,
                    }
                });
            }
        }

        join_all(pending).await
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
