use crate::traits::InlineImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use sitelens_common::{Result, SiteLensError};
use std::io::Cursor;

/// Longest side, in pixels, of an image sent inline to the model.
pub const MAX_INLINE_SIDE: u32 = 3072;
pub const JPEG_QUALITY: u8 = 85;

/// Downscale a screenshot so its longest side fits [`MAX_INLINE_SIDE`] and
/// re-encode it as JPEG. Full-page captures of long sites run to several MB as
/// PNG; several of them go into one request.
pub fn encode_for_llm(png: &[u8]) -> Result<InlineImage> {
    let img = image::load_from_memory(png)
        .map_err(|e| SiteLensError::Vision(format!("decode screenshot: {e}")))?;

    let (w, h) = (img.width(), img.height());
    let longest = w.max(h);
    let img = if longest > MAX_INLINE_SIDE {
        let ratio = MAX_INLINE_SIDE as f64 / longest as f64;
        let nw = ((w as f64 * ratio).round() as u32).max(1);
        let nh = ((h as f64 * ratio).round() as u32).max(1);
        tracing::debug!(from_w = w, from_h = h, to_w = nw, to_h = nh, "llm.image.downscale");
        img.resize_exact(nw, nh, FilterType::Triangle)
    } else {
        img
    };

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
        .map_err(|e| SiteLensError::Vision(format!("encode jpeg: {e}")))?;

    Ok(InlineImage::jpeg(out.into_inner()))
}
