use crate::site_browser::page::SitePage;
use anyhow::{anyhow, Result};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use sitelens_config::{BrowserConfig, BrowserKind};
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver session sized for page capture.
pub struct SiteDriver {
    pub client: Client,
    settings: BrowserConfig,
}

/// Capabilities for the configured browser. Firefox takes `-headless`; Chrome
/// needs the sandbox flags to run inside containers.
pub fn build_capabilities(settings: &BrowserConfig) -> Capabilities {
    let mut caps = Capabilities::new();
    match settings.kind {
        BrowserKind::Firefox => {
            let mut args = Vec::new();
            if settings.headless {
                args.push("-headless".to_string());
            }
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
        }
        BrowserKind::Chrome => {
            let mut args = vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--hide-scrollbars".to_string(),
                format!(
                    "--window-size={},{}",
                    settings.viewport_width, settings.viewport_height
                ),
            ];
            if settings.headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
            }
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
    }
    caps
}

impl SiteDriver {
    /// Start a session on the configured WebDriver endpoint and size its window.
    pub async fn connect(settings: &BrowserConfig) -> Result<Self> {
        let caps = build_capabilities(settings);

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&settings.webdriver_url)
            .await
            .map_err(|e| anyhow!("webdriver session at {}: {e}", settings.webdriver_url))?;

        client
            .set_window_size(settings.viewport_width, settings.viewport_height)
            .await?;
        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(Duration::from_secs(settings.page_load_timeout_secs)),
                None,
            ))
            .await?;

        tracing::info!(
            target: "browser.driver",
            kind = ?settings.kind,
            headless = settings.headless,
            endpoint = %settings.webdriver_url,
            "webdriver session started"
        );

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// Navigate to `url`, bounded by the page-load timeout, then let the page
    /// settle before returning a [`SitePage`].
    pub async fn open(&self, url: &str) -> Result<SitePage> {
        // Each site starts from the configured viewport, not the previous page's height.
        self.client
            .set_window_size(self.settings.viewport_width, self.settings.viewport_height)
            .await?;

        let budget = Duration::from_secs(self.settings.page_load_timeout_secs);
        tokio::time::timeout(budget, self.client.goto(url))
            .await
            .map_err(|_| anyhow!("page load timed out after {}s: {url}", budget.as_secs()))??;

        tokio::time::sleep(Duration::from_millis(self.settings.settle_ms)).await;
        Ok(SitePage::new(self.client.clone()))
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
