//! Driver layer for browser automation and section capture.
//!
//! This crate drives a WebDriver browser to each site, finds its header and
//! footer, and cuts one full-page screenshot into per-section PNGs.
//!
//! - [`site_browser::driver::SiteDriver`]: WebDriver session wrapper
//! - [`site_browser::page::SitePage`]: page measurements, selector lookup, screenshots
//! - [`site_browser::sections`]: selector lists, section layout and cropping
//! - [`site_browser::capture::WebDriverCapturer`]: batch capture behind [`BrowserCapturer`]
pub mod site_browser;

pub use site_browser::capture::{capture_site, BrowserCapturer, SiteCapture, WebDriverCapturer};
pub use site_browser::sections::{SectionLocator, SectionShots};
