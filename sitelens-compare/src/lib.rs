//! Comparison pipeline: capture each site, persist and optionally mirror the
//! screenshots, score sections with CLIP and the design reviewer, then blend
//! and rank.
//!
//! [`build_engine`] wires the concrete browser, model and storage backends from
//! a [`SiteLensConfig`]. The server only sees the [`Comparator`] trait.

pub mod engine;
pub mod report;
pub mod request;
pub mod scoring;

pub use engine::{ComparisonEngine, DEFAULT_CLIP_WEIGHT};
pub use report::{assemble_report, summary_table, ComparisonReport, SectionEntry, SiteSummary};
pub use request::{CompareRequest, DEFAULT_CATEGORY};
pub use scoring::{blend, rescale_llm};

use async_trait::async_trait;
use sitelens_common::Result;
use sitelens_config::SiteLensConfig;
use sitelens_drivers::WebDriverCapturer;
use sitelens_llm::gemini::GeminiClient;
use sitelens_storage::{CloudinaryClient, ScreenshotStore};
use std::sync::Arc;
use std::time::Duration;

/// Anything that can turn a request into a ranked report.
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(&self, request: &CompareRequest) -> Result<ComparisonReport>;
}

#[async_trait]
impl Comparator for ComparisonEngine {
    async fn compare(&self, request: &CompareRequest) -> Result<ComparisonReport> {
        ComparisonEngine::compare(self, request).await
    }
}

/// Build the production engine. Missing optional sections (`gemini`,
/// `cloudinary`, disabled `clip`) simply leave that stage out.
pub fn build_engine(config: &SiteLensConfig) -> Result<ComparisonEngine> {
    let capturer = Arc::new(WebDriverCapturer::new(config.browser.clone()));
    let store = ScreenshotStore::new(config.screenshots.dir.clone());
    let mut engine =
        ComparisonEngine::new(capturer, store).with_clip_weight(config.scoring.clip_weight);

    if config.clip.enabled {
        engine = with_local_clip(engine, config);
    }

    if let Some(gemini) = &config.gemini {
        let client = GeminiClient::new(gemini.api_key.clone(), gemini.model.clone())?
            .with_endpoint(&gemini.endpoint)?
            .with_timeout(Duration::from_secs(gemini.timeout_secs))
            .with_retries(gemini.retries);
        tracing::info!(model = %gemini.model, "design reviewer enabled");
        engine = engine.with_reviewer(Arc::new(client));
    }

    if let Some(cloudinary) = &config.cloudinary {
        let client = CloudinaryClient::from_config(cloudinary)?;
        tracing::info!(cloud = %cloudinary.cloud_name, folder = %cloudinary.folder, "image mirroring enabled");
        engine = engine.with_image_host(Arc::new(client));
    }

    Ok(engine)
}

#[cfg(feature = "fastembed")]
fn with_local_clip(engine: ComparisonEngine, config: &SiteLensConfig) -> ComparisonEngine {
    use sitelens_vision::{ClipScorer, FastEmbedEncoder};

    let encoder = Arc::new(FastEmbedEncoder::new(config.clip.cache_dir.clone()));
    let scorer = ClipScorer::new(encoder).with_preprocess(config.clip.preprocess);
    tracing::info!(preprocess = config.clip.preprocess, "clip scoring enabled");
    engine.with_clip(Arc::new(scorer))
}

#[cfg(not(feature = "fastembed"))]
fn with_local_clip(engine: ComparisonEngine, _config: &SiteLensConfig) -> ComparisonEngine {
    tracing::warn!("clip.enabled is set but this build has no fastembed support");
    engine
}
