use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use sitelens_common::{Result, SiteLensError};
use std::path::{Path, PathBuf};

pub const PROCESSED_WIDTH: u32 = 1280;
pub const PROCESSED_HEIGHT: u32 = 720;

/// Spread grey levels over the full range using the cumulative histogram.
pub fn equalize_histogram(img: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    let cdf_min = hist.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denom = total.saturating_sub(cdf_min);

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (level, count) in hist.iter().enumerate() {
        cdf += count;
        lut[level] = if denom == 0 {
            level as u8
        } else {
            let scaled = (cdf.saturating_sub(cdf_min)) as f64 * 255.0 / denom as f64;
            scaled.round().clamp(0.0, 255.0) as u8
        };
    }

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
    out
}

/// `<dir>/<stem>_processed.png` beside `path`.
pub fn processed_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!("{stem}_processed.png"))
}

/// Grayscale, equalize, resize to 1280x720 and return to RGB, writing the
/// result beside the input.
pub fn preprocess_image(path: &Path) -> Result<PathBuf> {
    let img = image::open(path)
        .map_err(|e| SiteLensError::Vision(format!("read {}: {e}", path.display())))?;

    let equalized = equalize_histogram(&img.to_luma8());
    let resized = image::imageops::resize(
        &equalized,
        PROCESSED_WIDTH,
        PROCESSED_HEIGHT,
        FilterType::Triangle,
    );
    let rgb = DynamicImage::ImageLuma8(resized).to_rgb8();

    let out = processed_path(path);
    rgb.save(&out)
        .map_err(|e| SiteLensError::Vision(format!("write {}: {e}", out.display())))?;
    tracing::debug!(target: "vision.preprocess", input = %path.display(), output = %out.display(), "image preprocessed");
    Ok(out)
}
