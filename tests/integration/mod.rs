// Shared fixtures for the integration tests

pub mod config_tests;
pub mod monitor_tests;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use pricewatch::config::{ExtractionConfig, MonitorConfig};
use pricewatch::extractor::Extractor;
use pricewatch::fetcher::{Fetcher, RawContent};
use pricewatch::models::{SiteProfile, Target};
use pricewatch::monitor::Monitor;
use pricewatch::plugins::PluginManager;
use pricewatch::store::TargetStore;
use pricewatch::utils::error::FetchFailure;

/// Fetcher that replays canned responses per URL and counts calls.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<RawContent, FetchFailure>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Result<RawContent, FetchFailure>) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn respond_price(&self, url: &str, price: &str) {
        self.respond(url, Ok(price_page(url, price)));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchFailure> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.responses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Err(FetchFailure::Transport("no scripted response".to_string())))
    }
}

pub fn price_page(url: &str, price: &str) -> RawContent {
    RawContent::new(
        url,
        format!(
            "<html><head><title>Product</title></head><body><div class=\"buy\"><span>{}</span></div></body></html>",
            price
        ),
    )
}

pub fn test_extractor() -> Arc<Extractor> {
    Arc::new(Extractor::new(SiteProfile::builtin(), &ExtractionConfig::default(), false).unwrap())
}

pub fn build_monitor(
    fetcher: Arc<dyn Fetcher>,
    store: TargetStore,
    config: MonitorConfig,
    notifiers: PluginManager,
) -> Monitor {
    Monitor::new(config, store, fetcher, test_extractor(), notifiers)
}

pub fn target(name: &str, url: &str, price: rust_decimal::Decimal) -> Target {
    Target::new(name, url, price)
}
