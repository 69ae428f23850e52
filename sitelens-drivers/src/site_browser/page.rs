use crate::site_browser::sections::{Located, Rect};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fantoccini::{Client, Locator};
use std::time::Duration;
use tracing::debug;

/// The page operations section capture needs. Implemented by [`SitePage`];
/// tests drive capture through an in-memory page.
#[async_trait]
pub trait CapturePage: Send + Sync {
    /// The first selector that matches anything wins; its first element's
    /// rectangle is returned.
    async fn locate_first(&self, selectors: &[String]) -> Result<Option<Located>>;

    /// Scrollable document height in CSS pixels.
    async fn document_height(&self) -> Result<f64>;

    /// `window.innerWidth` in CSS pixels.
    async fn inner_width(&self) -> Result<f64>;

    /// Resize so the viewport (not the outer window) is `width` x `height`.
    async fn resize_viewport(&self, width: u32, height: u32) -> Result<()>;

    /// PNG screenshot of the current viewport.
    async fn screenshot_png(&self) -> Result<Vec<u8>>;
}

/// A loaded page in a live WebDriver session.
pub struct SitePage {
    pub(crate) client: Client,
}

impl SitePage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Return the current page URL.
    pub async fn get_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(anyhow::Error::msg)
    }

    /// Return the page title.
    pub async fn get_title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::msg)
    }

    async fn eval_f64(&self, script: &str) -> Result<f64> {
        let value = self.client.execute(script, vec![]).await?;
        value
            .as_f64()
            .ok_or_else(|| anyhow!("script returned non-numeric value: {value}"))
    }

    async fn inner_size(&self) -> Result<(f64, f64)> {
        let w = self.eval_f64("return window.innerWidth;").await?;
        let h = self.eval_f64("return window.innerHeight;").await?;
        Ok((w, h))
    }
}

#[async_trait]
impl CapturePage for SitePage {
    async fn locate_first(&self, selectors: &[String]) -> Result<Option<Located>> {
        for selector in selectors {
            let elements = match self.client.find_all(Locator::Css(selector)).await {
                Ok(found) => found,
                Err(e) => {
                    // Invalid selectors and stale documents both count as no match.
                    debug!(target: "browser.selector", %selector, error = %e, "selector lookup failed");
                    continue;
                }
            };
            let Some(first) = elements.into_iter().next() else {
                continue;
            };
            match first.rectangle().await {
                Ok((x, y, width, height)) => {
                    debug!(target: "browser.selector", %selector, x, y, width, height, "selector matched");
                    return Ok(Some(Located {
                        selector: selector.clone(),
                        rect: Rect {
                            x,
                            y,
                            width,
                            height,
                        },
                    }));
                }
                Err(e) => {
                    debug!(target: "browser.selector", %selector, error = %e, "element rect unavailable");
                }
            }
        }
        Ok(None)
    }

    async fn document_height(&self) -> Result<f64> {
        self.eval_f64(
            "return Math.max(document.body ? document.body.scrollHeight : 0, \
             document.documentElement ? document.documentElement.scrollHeight : 0);",
        )
        .await
    }

    async fn inner_width(&self) -> Result<f64> {
        self.eval_f64("return window.innerWidth;").await
    }

    async fn resize_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.client.set_window_size(width, height).await?;
        let (inner_w, inner_h) = self.inner_size().await?;

        // Window size includes browser chrome; grow by the difference once.
        let extra_w = (width as f64 - inner_w).max(0.0).round() as u32;
        let extra_h = (height as f64 - inner_h).max(0.0).round() as u32;
        if extra_w > 0 || extra_h > 0 {
            self.client
                .set_window_size(width + extra_w, height + extra_h)
                .await?;
        }
        // Give lazy-loaded content a moment to lay out at the new size.
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.client.screenshot().await.map_err(anyhow::Error::from)
    }
}
