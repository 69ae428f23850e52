//! CLIP-based visual scoring for section screenshots.
//!
//! A section image and a section-specific text prompt are embedded in the same
//! space; their cosine similarity, mapped to `[0, 1]`, is the section's CLIP
//! score. Images can be normalized first (grayscale, histogram equalization,
//! fixed 1280x720 size) so lighting and aspect ratio matter less.
//!
//! ```no_run
//! # #[cfg(feature = "fastembed")]
//! # fn demo() -> sitelens_common::Result<()> {
//! use sitelens_common::Section;
//! use sitelens_vision::{ClipScorer, FastEmbedEncoder};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let scorer = ClipScorer::new(Arc::new(FastEmbedEncoder::new(None)));
//! let score = scorer.score(Path::new("screenshots/shop/shop_header.png"), Section::Header, "ecommerce")?;
//! println!("{:.3}", score.normalized);
//! # Ok(())
//! # }
//! ```
pub mod encoder;
pub mod preprocess;
pub mod scorer;

#[cfg(feature = "fastembed")]
pub use encoder::FastEmbedEncoder;
pub use encoder::ImageTextEncoder;
pub use preprocess::preprocess_image;
pub use scorer::{clip_prompt, cosine_similarity, ClipScore, ClipScorer};
