//! Headless browser session backing the scroll source.
//!
//! A [`BrowserSession`] owns the Chromium child process for exactly one run.
//! Callers must finish with [`BrowserSession::close`]; if the session is
//! dropped instead (for example while unwinding), `chromiumoxide` kills the
//! child process when the `Browser` is dropped.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::constants::BROWSER_USER_AGENT;
use crate::sources::RenderedView;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Default bound on a single CDP request, including navigation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub request_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A running browser and the task pumping its CDP events.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a new browser process.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected or the process
    /// cannot be started.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        info!(headless = settings.headless, "Launching browser");

        let mut config_builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .request_timeout(settings.request_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--mute-audio")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"));

        config_builder = if settings.headless {
            config_builder.arg("--headless=new")
        } else {
            config_builder.with_head()
        };

        if let Some(ref chrome_path) = settings.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        info!("Browser launched");
        Ok(Self { browser, handler })
    }

    /// Open a blank tab to render the feed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab cannot be created.
    pub async fn open_view(&self) -> Result<ChromiumView> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;
        Ok(ChromiumView { page })
    }

    /// Shut the browser down and wait for the process to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            error!("Failed to close browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            error!("Failed waiting for browser exit: {e}");
        }
        self.handler.abort();
        info!("Browser shutdown complete");
    }
}

/// A browser tab exposed as a [`RenderedView`].
pub struct ChromiumView {
    page: Page,
}

#[async_trait]
impl RenderedView for ChromiumView {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        self.page
            .evaluate(script)
            .await
            .context("Selector probe failed")?
            .into_value()
            .context("Selector probe returned a non-boolean")
    }

    async fn html(&self) -> Result<String> {
        self.page.content().await.context("Failed to read page content")
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("Scroll failed")?;
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<u64> {
        self.page
            .evaluate("document.body.scrollHeight")
            .await
            .context("Failed to measure page height")?
            .into_value()
            .context("Page height was not a number")
    }
}
