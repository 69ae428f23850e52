use crate::encoder::ImageTextEncoder;
use crate::preprocess::preprocess_image;
use sitelens_common::{CriteriaScores, Result, Section, SiteLensError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Text prompt a section is scored against.
pub fn clip_prompt(section: Section, category: &str) -> String {
    match section {
        Section::Header => format!(
            "Evaluate the header section of a {category} website based on visual appeal, creativity, and branding consistency."
        ),
        Section::Main => format!(
            "Evaluate the main section of a {category} website based on design clarity, layout, and visual hierarchy."
        ),
        Section::Footer => format!(
            "Evaluate the footer section of a {category} website based on information completeness and accessibility."
        ),
        Section::Full => format!(
            "Evaluate the entire {category} website homepage for overall design quality, user experience, and branding consistency."
        ),
    }
}

/// Cosine of the angle between `a` and `b`. Mismatched, empty or zero
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

/// CLIP result for one section image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipScore {
    /// Raw cosine similarity in `[-1, 1]`.
    pub similarity: f64,
    /// `(similarity + 1) / 2`.
    pub normalized: f64,
    pub criteria: CriteriaScores,
}

/// Scores section screenshots against per-section text prompts.
pub struct ClipScorer {
    encoder: Arc<dyn ImageTextEncoder>,
    preprocess: bool,
    text_cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl ClipScorer {
    pub fn new(encoder: Arc<dyn ImageTextEncoder>) -> Self {
        Self {
            encoder,
            preprocess: true,
            text_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Toggle the grayscale/equalize/resize pass before embedding.
    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    fn text_embedding(&self, prompt: &str) -> Result<Vec<f32>> {
        {
            let cache = self
                .text_cache
                .lock()
                .map_err(|_| SiteLensError::Vision("prompt cache lock poisoned".to_string()))?;
            if let Some(hit) = cache.get(prompt) {
                return Ok(hit.clone());
            }
        }
        let embedding = self.encoder.embed_text(prompt)?;
        self.text_cache
            .lock()
            .map_err(|_| SiteLensError::Vision("prompt cache lock poisoned".to_string()))?
            .insert(prompt.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Blocking: embeds the image and compares it with the section prompt.
    pub fn score(&self, path: &Path, section: Section, category: &str) -> Result<ClipScore> {
        let image_path = if self.preprocess {
            preprocess_image(path)?
        } else {
            path.to_path_buf()
        };

        let prompt = clip_prompt(section, category);
        let text = self.text_embedding(&prompt)?;
        let image = self.encoder.embed_image(&image_path)?;

        let similarity = cosine_similarity(&image, &text);
        let normalized = (similarity + 1.0) / 2.0;
        tracing::debug!(
            target: "vision.clip",
            path = %path.display(),
            %section,
            similarity,
            normalized,
            model = self.encoder.model_name(),
            "section scored"
        );
        Ok(ClipScore {
            similarity,
            normalized,
            criteria: CriteriaScores::from_clip(normalized),
        })
    }
}
