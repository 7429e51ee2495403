use async_trait::async_trait;
use headless_chrome::protocol::cdp::Target;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::utils::error::ExtractionFailure;
use crate::utils::user_agents::random_user_agent;

/// Produces the DOM of a page after client-side scripts have run.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, ExtractionFailure>;
}

/// Headless Chrome renderer. The browser process is launched on first use and
/// reused; every render gets its own incognito context and tab.
pub struct ChromeRenderer {
    config: ScraperConfig,
    browser: Mutex<Option<Browser>>,
}

impl ChromeRenderer {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    fn launch(config: &ScraperConfig) -> Result<Browser, ExtractionFailure> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(Duration::from_secs(3600))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--window-size=1920,1080"),
            ])
            .build()
            .map_err(|e| {
                ExtractionFailure::RenderUnavailable(format!("invalid launch options: {}", e))
            })?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        Browser::new(launch_options)
            .map_err(|e| ExtractionFailure::RenderUnavailable(format!("failed to launch browser: {}", e)))
    }

    async fn browser(&self) -> Result<Browser, ExtractionFailure> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }

        let config = self.config.clone();
        let browser = tokio::task::spawn_blocking(move || Self::launch(&config))
            .await
            .map_err(|e| ExtractionFailure::RenderUnavailable(format!("launch task failed: {}", e)))??;

        info!("Headless browser launched");
        *guard = Some(browser.clone());
        Ok(browser)
    }

    async fn discard_browser(&self) {
        let mut guard = self.browser.lock().await;
        if guard.take().is_some() {
            warn!("Discarding headless browser after render failure");
        }
    }

    fn render_blocking(
        browser: &Browser,
        url: &str,
        wait: Duration,
        timeout: Duration,
    ) -> Result<String, ExtractionFailure> {
        let context = browser
            .new_context()
            .map_err(|e| unavailable("failed to create browser context", e))?;
        let context_id = context.get_id().to_string();

        let content = context
            .new_tab()
            .map_err(|e| unavailable("failed to create tab", e))
            .and_then(|tab| Self::load_tab(&tab, url, wait, timeout));

        // Contexts outlive their tabs until disposed explicitly.
        if let Err(e) = browser.call_method(dispose_context(&context_id)) {
            debug!("Failed to dispose browser context {}: {}", context_id, e);
        }
        content
    }

    fn load_tab(tab: &Tab, url: &str, wait: Duration, timeout: Duration) -> Result<String, ExtractionFailure> {
        tab.set_default_timeout(timeout);
        let content = tab
            .set_user_agent(random_user_agent(), Some("en-US,en;q=0.5"), None)
            .map_err(|e| unavailable("failed to set user agent", e))
            .and_then(|_| {
                tab.navigate_to(url)
                    .and_then(|tab| tab.wait_until_navigated())
                    .map_err(|e| unavailable("page load failed", e))
            })
            .and_then(|_| {
                // Give client-side scripts time to inject the price.
                std::thread::sleep(wait);
                tab.get_content()
                    .map_err(|e| unavailable("failed to read page content", e))
            });

        let _ = tab.close(true);
        content
    }
}

fn unavailable(stage: &str, e: anyhow::Error) -> ExtractionFailure {
    ExtractionFailure::RenderUnavailable(format!("{}: {}", stage, e))
}

fn dispose_context(context_id: &str) -> Target::DisposeBrowserContext {
    Target::DisposeBrowserContext {
        browser_context_id: context_id.to_string(),
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String, ExtractionFailure> {
        let browser = self.browser().await?;
        let url_owned = url.to_string();
        let wait = Duration::from_millis(self.config.render_wait_ms);
        let timeout = self.config.request_timeout();

        debug!("Rendering {}", url);
        let result = tokio::task::spawn_blocking(move || {
            Self::render_blocking(&browser, &url_owned, wait, timeout)
        })
        .await
        .map_err(|e| ExtractionFailure::RenderUnavailable(format!("render task failed: {}", e)))?;

        if result.is_err() {
            self.discard_browser().await;
        }
        result
    }
}
