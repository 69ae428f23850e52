use sitelens_common::Result;
use std::path::Path;

/// Joint image/text embedding model. Calls block on model inference; run them
/// on the blocking pool from async code.
pub trait ImageTextEncoder: Send + Sync {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>>;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str {
        "clip"
    }
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedEncoder;

#[cfg(feature = "fastembed")]
mod local {
    use super::ImageTextEncoder;
    use fastembed::{
        EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
        TextEmbedding,
    };
    use sitelens_common::{Result, SiteLensError};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// CLIP ViT-B/32 through fastembed's ONNX models. Both halves load on
    /// first use and download into `cache_dir` when missing.
    pub struct FastEmbedEncoder {
        cache_dir: Option<PathBuf>,
        image: Mutex<Option<ImageEmbedding>>,
        text: Mutex<Option<TextEmbedding>>,
    }

    impl FastEmbedEncoder {
        pub fn new(cache_dir: Option<PathBuf>) -> Self {
            Self {
                cache_dir,
                image: Mutex::new(None),
                text: Mutex::new(None),
            }
        }

        fn vision_err(what: &str, e: impl std::fmt::Display) -> SiteLensError {
            SiteLensError::Vision(format!("{what}: {e}"))
        }

        fn first(embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>> {
            embeddings
                .into_iter()
                .next()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SiteLensError::Vision("Empty embedding response".to_string()))
        }
    }

    impl ImageTextEncoder for FastEmbedEncoder {
        fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
            let mut guard = self
                .image
                .lock()
                .map_err(|_| SiteLensError::Vision("image encoder lock poisoned".to_string()))?;
            if guard.is_none() {
                let mut options = ImageInitOptions::default();
                options.model_name = ImageEmbeddingModel::ClipVitB32;
                if let Some(dir) = &self.cache_dir {
                    options.cache_dir = dir.clone();
                }
                tracing::info!(target: "vision.clip", "loading CLIP image encoder");
                let model = ImageEmbedding::try_new(options)
                    .map_err(|e| Self::vision_err("Failed to init CLIP image encoder", e))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| SiteLensError::Vision("CLIP image encoder unavailable".into()))?;
            let embeddings = model
                .embed(vec![path.to_path_buf()], None)
                .map_err(|e| Self::vision_err("Failed to embed image", e))?;
            Self::first(embeddings)
        }

        fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            let mut guard = self
                .text
                .lock()
                .map_err(|_| SiteLensError::Vision("text encoder lock poisoned".to_string()))?;
            if guard.is_none() {
                let mut options = InitOptions::default();
                options.model_name = EmbeddingModel::ClipVitB32;
                if let Some(dir) = &self.cache_dir {
                    options.cache_dir = dir.clone();
                }
                tracing::info!(target: "vision.clip", "loading CLIP text encoder");
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| Self::vision_err("Failed to init CLIP text encoder", e))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| SiteLensError::Vision("CLIP text encoder unavailable".into()))?;
            let embeddings = model
                .embed(vec![text.to_string()], None)
                .map_err(|e| Self::vision_err("Failed to embed text", e))?;
            Self::first(embeddings)
        }

        fn model_name(&self) -> &str {
            "clip-vit-b32"
        }
    }
}
