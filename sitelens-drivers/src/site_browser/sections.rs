use image::{DynamicImage, ImageFormat};
use sitelens_common::{Result, Section, SiteLensError};
use sitelens_config::BrowserConfig;
use std::io::Cursor;

const DEFAULT_HEADER_SELECTORS: &[&str] = &[
    "header",
    "nav",
    "div[role=\"banner\"]",
    ".header",
    ".navbar",
    "#header",
    "#nav-main",
    "#navbar",
    ".top-bar",
    ".main-header",
    ".global-header",
    "div[data-role=\"header\"]",
    ".site-header",
    "div[class*=\"header\"]",
    "div[class*=\"navbar\"]",
    "div[class*=\"top\"]",
    "#masthead",
    ".page-header",
    "#site-header",
    "#main-header",
    ".app-header",
    ".layout-header",
    "#branding",
    "ytd-masthead",
    "ytd-app > #masthead-container",
];

const DEFAULT_FOOTER_SELECTORS: &[&str] = &[
    "footer",
    ".footer",
    "#footer",
    "#navFooter",
    ".site-footer",
    ".bottom-bar",
    "div[role=\"contentinfo\"]",
    ".main-footer",
    ".global-footer",
    ".footer-wrapper",
    "div[class*=\"footer\"]",
    "div[class*=\"bottom\"]",
    "div[data-role=\"footer\"]",
    ".site-info",
    "#colophon",
    "#page-footer",
    ".app-footer",
    ".layout-footer",
    "ytd-footer",
    "ytd-app > #footer",
];

/// Element rectangle in CSS pixels, document coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A selector hit: which selector matched and where its first element sits.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub selector: String,
    pub rect: Rect,
}

/// Ordered selector lists used to find a page's header and footer.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLocator {
    pub header: Vec<String>,
    pub footer: Vec<String>,
}

impl Default for SectionLocator {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER_SELECTORS.iter().map(|s| s.to_string()).collect(),
            footer: DEFAULT_FOOTER_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SectionLocator {
    /// Defaults, with either list replaced when the config names one.
    pub fn from_config(settings: &BrowserConfig) -> Self {
        let mut locator = Self::default();
        if let Some(header) = settings.header_selectors.as_ref().filter(|l| !l.is_empty()) {
            locator.header = header.clone();
        }
        if let Some(footer) = settings.footer_selectors.as_ref().filter(|l| !l.is_empty()) {
            locator.footer = footer.clone();
        }
        locator
    }
}

/// Header, optional main, and footer rectangles in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLayout {
    pub header: Rect,
    pub main: Option<Rect>,
    pub footer: Rect,
}

/// Main content spans from the header's bottom edge to the footer's top, full
/// viewport width. It is dropped when no taller than `min_main_height`.
pub fn layout_sections(
    header: Rect,
    footer: Rect,
    viewport_width: f64,
    min_main_height: f64,
) -> SectionLayout {
    let top = header.bottom();
    let height = (footer.y - top).max(0.0);
    let main = (height > min_main_height).then_some(Rect {
        x: 0.0,
        y: top,
        width: viewport_width,
        height,
    });
    SectionLayout {
        header,
        main,
        footer,
    }
}

/// Crop `rect` (CSS pixels) out of an already decoded screenshot. `scale` is
/// device pixels per CSS pixel.
pub fn crop_image(full: &DynamicImage, rect: Rect, scale: f64) -> Result<Vec<u8>> {
    let (img_w, img_h) = (full.width() as f64, full.height() as f64);
    let x0 = (rect.x * scale).floor().clamp(0.0, img_w);
    let y0 = (rect.y * scale).floor().clamp(0.0, img_h);
    let x1 = ((rect.x + rect.width) * scale).ceil().clamp(0.0, img_w);
    let y1 = ((rect.y + rect.height) * scale).ceil().clamp(0.0, img_h);

    if x1 <= x0 || y1 <= y0 {
        return Err(SiteLensError::Browser(format!(
            "section {rect:?} lies outside the {img_w}x{img_h} screenshot"
        )));
    }

    let cropped = full.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
    encode_png(&cropped)
}

/// Decode a PNG screenshot and crop `rect` from it.
pub fn crop_png(full: &[u8], rect: Rect, scale: f64) -> Result<Vec<u8>> {
    let img = decode_png(full)?;
    crop_image(&img, rect, scale)
}

pub(crate) fn decode_png(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| SiteLensError::Browser(format!("decode screenshot: {e}")))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| SiteLensError::Browser(format!("encode section png: {e}")))?;
    Ok(out.into_inner())
}

/// PNG bytes for every captured section of one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionShots {
    pub header: Vec<u8>,
    pub main: Option<Vec<u8>>,
    /// `None` when the footer lies below the captured height.
    pub footer: Option<Vec<u8>>,
    pub full: Vec<u8>,
}

impl SectionShots {
    pub fn get(&self, section: Section) -> Option<&[u8]> {
        match section {
            Section::Header => Some(&self.header),
            Section::Main => self.main.as_deref(),
            Section::Footer => self.footer.as_deref(),
            Section::Full => Some(&self.full),
        }
    }

    /// Present sections in report order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &[u8])> + '_ {
        Section::ALL
            .into_iter()
            .filter_map(move |s| self.get(s).map(|bytes| (s, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([9, 9, 9, 255])));
        encode_png(&img).unwrap()
    }

    #[test]
    fn main_spans_header_bottom_to_footer_top() {
        let layout = layout_sections(
            rect(0.0, 0.0, 1280.0, 120.0),
            rect(0.0, 2400.0, 1280.0, 300.0),
            1280.0,
            50.0,
        );
        assert_eq!(layout.main, Some(rect(0.0, 120.0, 1280.0, 2280.0)));
    }

    #[test]
    fn thin_main_is_dropped() {
        let layout = layout_sections(
            rect(0.0, 0.0, 1280.0, 100.0),
            rect(0.0, 150.0, 1280.0, 80.0),
            1280.0,
            50.0,
        );
        assert_eq!(layout.main, None);
    }

    #[test]
    fn overlapping_header_and_footer_have_no_main() {
        let layout = layout_sections(
            rect(0.0, 0.0, 1280.0, 500.0),
            rect(0.0, 300.0, 1280.0, 80.0),
            1280.0,
            50.0,
        );
        assert_eq!(layout.main, None);
    }

    #[test]
    fn crop_applies_device_scale() {
        let full = png(200, 400);
        let out = crop_png(&full, rect(10.0, 20.0, 50.0, 30.0), 2.0).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (100, 60));
    }

    #[test]
    fn crop_is_clamped_to_image() {
        let full = png(100, 100);
        let out = crop_png(&full, rect(80.0, 80.0, 50.0, 50.0), 1.0).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (20, 20));
    }

    #[test]
    fn crop_outside_image_fails() {
        let full = png(100, 100);
        assert!(crop_png(&full, rect(0.0, 150.0, 100.0, 20.0), 1.0).is_err());
    }

    #[test]
    fn locator_overrides_replace_defaults() {
        let settings = BrowserConfig {
            header_selectors: Some(vec!["#top".into()]),
            footer_selectors: Some(vec![]),
            ..BrowserConfig::default()
        };
        let locator = SectionLocator::from_config(&settings);
        assert_eq!(locator.header, vec!["#top".to_string()]);
        assert_eq!(locator.footer[0], "footer");
        assert_eq!(locator.footer.len(), DEFAULT_FOOTER_SELECTORS.len());
    }

    #[test]
    fn shots_iterate_present_sections_in_order() {
        let shots = SectionShots {
            header: vec![1],
            main: None,
            footer: Some(vec![3]),
            full: vec![4],
        };
        let order: Vec<Section> = shots.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec![Section::Header, Section::Footer, Section::Full]);

        let clipped = SectionShots {
            footer: None,
            ..shots
        };
        assert_eq!(clipped.get(Section::Footer), None);
        assert_eq!(clipped.iter().count(), 2);
    }
}
