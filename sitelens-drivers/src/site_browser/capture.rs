use crate::site_browser::driver::SiteDriver;
use crate::site_browser::page::CapturePage;
use crate::site_browser::sections::{
    crop_image, decode_png, layout_sections, Rect, SectionLocator, SectionShots,
};
use async_trait::async_trait;
use sitelens_common::{Result, Section, SiteLensError, WebsiteInput};
use sitelens_config::BrowserConfig;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Screenshots taken for one site.
#[derive(Debug, Clone)]
pub struct SiteCapture {
    pub site: WebsiteInput,
    pub shots: SectionShots,
}

fn browser_err(e: anyhow::Error) -> SiteLensError {
    SiteLensError::Browser(format!("{e:#}"))
}

/// Grow the viewport to the page, screenshot once, and crop the header, main
/// content and footer out of that single image.
pub async fn capture_site<P>(
    page: &P,
    locator: &SectionLocator,
    settings: &BrowserConfig,
) -> Result<SectionShots>
where
    P: CapturePage + ?Sized,
{
    let doc_height = page.document_height().await.map_err(browser_err)?;
    let target_height = if doc_height > 0.0 {
        doc_height.min(settings.max_page_height as f64).ceil() as u32
    } else {
        settings.viewport_height
    };
    page.resize_viewport(settings.viewport_width, target_height)
        .await
        .map_err(browser_err)?;

    let header = page
        .locate_first(&locator.header)
        .await
        .map_err(browser_err)?;
    let footer = page
        .locate_first(&locator.footer)
        .await
        .map_err(browser_err)?;
    let (header, footer) = match (header, footer) {
        (Some(h), Some(f)) if !h.rect.is_degenerate() && !f.rect.is_degenerate() => (h, f),
        (h, f) => {
            warn!(
                target: "browser.capture",
                header = ?h.map(|l| l.selector),
                footer = ?f.map(|l| l.selector),
                "section anchors missing or empty"
            );
            return Err(SiteLensError::Browser(
                "couldn't find header or footer".to_string(),
            ));
        }
    };

    let full = page.screenshot_png().await.map_err(browser_err)?;
    let inner_width = page.inner_width().await.map_err(browser_err)?;
    let full_img = decode_png(&full)?;
    let scale = if inner_width > 0.0 {
        full_img.width() as f64 / inner_width
    } else {
        1.0
    };

    let css_width = if inner_width > 0.0 {
        inner_width
    } else {
        settings.viewport_width as f64
    };
    let layout = layout_sections(
        header.rect,
        footer.rect,
        css_width,
        settings.min_main_height as f64,
    );

    info!(
        target: "browser.capture",
        doc_height,
        target_height,
        scale,
        header_selector = %header.selector,
        footer_selector = %footer.selector,
        main_height = layout.main.map(|m| m.height).unwrap_or(0.0),
        "sections located"
    );

    // Pages taller than max_page_height are cut off; only the header is
    // required to land inside the screenshot.
    let header_png = crop_image(&full_img, layout.header, scale)?;
    let crop_or_skip = |section: Section, rect: Rect| match crop_image(&full_img, rect, scale) {
        Ok(png) => Some(png),
        Err(e) => {
            warn!(target: "browser.capture", %section, error = %e, "section skipped");
            None
        }
    };
    let main_png = layout.main.and_then(|rect| crop_or_skip(Section::Main, rect));
    let footer_png = crop_or_skip(Section::Footer, layout.footer);

    Ok(SectionShots {
        header: header_png,
        main: main_png,
        footer: footer_png,
        full,
    })
}

/// Captures section screenshots for a batch of sites.
#[async_trait]
pub trait BrowserCapturer: Send + Sync {
    /// Sites that fail are skipped, so the result may be shorter than `sites`.
    async fn capture(&self, sites: &[WebsiteInput]) -> Result<Vec<SiteCapture>>;
}

/// Concrete capturer backed by a fantoccini WebDriver session.
pub struct WebDriverCapturer {
    settings: BrowserConfig,
    locator: SectionLocator,
}

impl WebDriverCapturer {
    pub fn new(settings: BrowserConfig) -> Self {
        let locator = SectionLocator::from_config(&settings);
        Self { settings, locator }
    }

    async fn capture_one(&self, driver: &SiteDriver, site: &WebsiteInput) -> Result<SectionShots> {
        let page = driver.open(&site.url).await.map_err(browser_err)?;
        if let (Ok(landed), Ok(title)) = (page.get_url().await, page.get_title().await) {
            debug!(target: "browser.capture", site = %site.name, %landed, %title, "page loaded");
        }
        capture_site(&page, &self.locator, &self.settings).await
    }
}

#[async_trait]
impl BrowserCapturer for WebDriverCapturer {
    async fn capture(&self, sites: &[WebsiteInput]) -> Result<Vec<SiteCapture>> {
        let driver = SiteDriver::connect(&self.settings)
            .await
            .map_err(browser_err)?;

        let mut captures = Vec::with_capacity(sites.len());
        for site in sites {
            let t0 = Instant::now();
            match self.capture_one(&driver, site).await {
                Ok(shots) => {
                    info!(
                        target: "browser.capture",
                        site = %site.name,
                        url = %site.url,
                        has_main = shots.main.is_some(),
                        has_footer = shots.footer.is_some(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "site captured"
                    );
                    captures.push(SiteCapture {
                        site: site.clone(),
                        shots,
                    });
                }
                Err(e) => {
                    warn!(
                        target: "browser.capture",
                        site = %site.name,
                        url = %site.url,
                        error = %e,
                        "site capture failed; skipping"
                    );
                }
            }
        }

        // Always attempt to close the driver before returning
        if let Err(e) = driver.close().await {
            warn!(target: "browser.driver", error = %e, "webdriver session close failed");
        }
        Ok(captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_browser::sections::{Located, Rect};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakePage {
        width_px: u32,
        css_width: f64,
        doc_height: f64,
        header: Option<Rect>,
        footer: Option<Rect>,
        resized: Mutex<Option<(u32, u32)>>,
    }

    impl FakePage {
        fn new(header: Option<Rect>, footer: Option<Rect>) -> Self {
            Self {
                width_px: 2560,
                css_width: 1280.0,
                doc_height: 1000.0,
                header,
                footer,
                resized: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CapturePage for FakePage {
        async fn locate_first(&self, selectors: &[String]) -> anyhow::Result<Option<Located>> {
            let rect = if selectors.iter().any(|s| s == "header") {
                self.header
            } else {
                self.footer
            };
            Ok(rect.map(|rect| Located {
                selector: selectors[0].clone(),
                rect,
            }))
        }

        async fn document_height(&self) -> anyhow::Result<f64> {
            Ok(self.doc_height)
        }

        async fn inner_width(&self) -> anyhow::Result<f64> {
            Ok(self.css_width)
        }

        async fn resize_viewport(&self, width: u32, height: u32) -> anyhow::Result<()> {
            *self.resized.lock().unwrap() = Some((width, height));
            Ok(())
        }

        async fn screenshot_png(&self) -> anyhow::Result<Vec<u8>> {
            let css_height = match *self.resized.lock().unwrap() {
                Some((_, h)) => h as f64,
                None => self.doc_height,
            };
            let h = (css_height * 2.0) as u32;
            let img = RgbaImage::from_pixel(self.width_px, h, Rgba([200, 200, 200, 255]));
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(img)
                .write_to(&mut buf, ImageFormat::Png)
                .unwrap();
            Ok(buf.into_inner())
        }
    }

    fn rect(y: f64, height: f64) -> Rect {
        Rect {
            x: 0.0,
            y,
            width: 1280.0,
            height,
        }
    }

    fn dims(png: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(png).unwrap();
        (img.width(), img.height())
    }

    #[tokio::test]
    async fn crops_sections_at_device_scale() {
        let page = FakePage::new(Some(rect(0.0, 100.0)), Some(rect(800.0, 200.0)));
        let shots = capture_site(&page, &SectionLocator::default(), &BrowserConfig::default())
            .await
            .unwrap();

        assert_eq!(*page.resized.lock().unwrap(), Some((1280, 1000)));
        assert_eq!(dims(&shots.header), (2560, 200));
        assert_eq!(dims(shots.main.as_ref().unwrap()), (2560, 1400));
        assert_eq!(dims(shots.footer.as_ref().unwrap()), (2560, 400));
        assert_eq!(dims(&shots.full), (2560, 2000));
    }

    #[tokio::test]
    async fn viewport_is_capped_at_max_page_height() {
        let mut page = FakePage::new(Some(rect(0.0, 100.0)), Some(rect(300.0, 100.0)));
        page.doc_height = 400.0;
        let settings = BrowserConfig {
            max_page_height: 350,
            ..BrowserConfig::default()
        };
        capture_site(&page, &SectionLocator::default(), &settings)
            .await
            .unwrap();
        assert_eq!(*page.resized.lock().unwrap(), Some((1280, 350)));
    }

    #[tokio::test]
    async fn footer_below_max_page_height_is_skipped() {
        let mut page = FakePage::new(Some(rect(0.0, 100.0)), Some(rect(2800.0, 200.0)));
        page.doc_height = 3000.0;
        let settings = BrowserConfig {
            max_page_height: 1000,
            ..BrowserConfig::default()
        };
        let shots = capture_site(&page, &SectionLocator::default(), &settings)
            .await
            .unwrap();

        assert_eq!(*page.resized.lock().unwrap(), Some((1280, 1000)));
        assert_eq!(shots.footer, None);
        assert_eq!(dims(&shots.header), (2560, 200));
        // main is cut at the bottom of the capture
        assert_eq!(dims(shots.main.as_ref().unwrap()), (2560, 1800));
        assert_eq!(dims(&shots.full), (2560, 2000));
    }

    #[tokio::test]
    async fn missing_footer_fails() {
        let page = FakePage::new(Some(rect(0.0, 100.0)), None);
        let err = capture_site(&page, &SectionLocator::default(), &BrowserConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("couldn't find header or footer"));
    }

    #[tokio::test]
    async fn zero_height_header_fails() {
        let page = FakePage::new(Some(rect(0.0, 0.0)), Some(rect(800.0, 200.0)));
        assert!(
            capture_site(&page, &SectionLocator::default(), &BrowserConfig::default())
                .await
                .is_err()
        );
    }
}
