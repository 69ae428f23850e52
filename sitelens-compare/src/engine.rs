use crate::report::{assemble_report, summary_table, ComparisonReport, SiteResults};
use crate::request::CompareRequest;
use futures::future::join_all;
use sitelens_common::{Result, Section, SiteLensError};
use sitelens_drivers::{BrowserCapturer, SiteCapture};
use sitelens_llm::review::{review_websites, DesignReview, ReviewSubject};
use sitelens_llm::{encode_for_llm, LlmClient};
use sitelens_storage::{upload_site, ImageHost, ScreenshotStore, StoredShot};
use sitelens_vision::ClipScorer;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_CLIP_WEIGHT: f64 = 0.5;

/// Runs capture, persistence, scoring and ranking for one request.
///
/// CLIP, the design reviewer and the image host are all optional. Without any
/// scorer every entry is dropped and the report comes back empty.
pub struct ComparisonEngine {
    capturer: Arc<dyn BrowserCapturer>,
    store: ScreenshotStore,
    clip: Option<Arc<ClipScorer>>,
    reviewer: Option<Arc<dyn LlmClient>>,
    image_host: Option<Arc<dyn ImageHost>>,
    clip_weight: f64,
}

impl ComparisonEngine {
    pub fn new(capturer: Arc<dyn BrowserCapturer>, store: ScreenshotStore) -> Self {
        Self {
            capturer,
            store,
            clip: None,
            reviewer: None,
            image_host: None,
            clip_weight: DEFAULT_CLIP_WEIGHT,
        }
    }

    pub fn with_clip(mut self, scorer: Arc<ClipScorer>) -> Self {
        self.clip = Some(scorer);
        self
    }

    pub fn with_reviewer(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.reviewer = Some(llm);
        self
    }

    pub fn with_image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.image_host = Some(host);
        self
    }

    pub fn with_clip_weight(mut self, weight: f64) -> Self {
        self.clip_weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn clip_enabled(&self) -> bool {
        self.clip.is_some()
    }

    pub async fn compare(&self, request: &CompareRequest) -> Result<ComparisonReport> {
        request.validate()?;
        let category = request.category().to_string();
        let started = Instant::now();
        info!(
            target: "compare",
            sites = request.websites.len(),
            %category,
            clip = self.clip_enabled(),
            reviewer = self.reviewer.as_ref().map(|r| r.model_name()),
            "comparison.start"
        );

        let captures = self.capturer.capture(&request.websites).await?;
        if captures.is_empty() {
            warn!(target: "compare", "no site could be captured; returning empty report");
            return Ok(ComparisonReport::default());
        }

        let mut captured = Vec::with_capacity(captures.len());
        let mut sites = Vec::with_capacity(captures.len());
        for capture in &captures {
            match self.persist(capture).await {
                Ok(results) => {
                    captured.push(capture);
                    sites.push(results);
                }
                Err(e) => warn!(
                    target: "compare",
                    site = %capture.site.name,
                    error = %e,
                    "saving screenshots failed; skipping site"
                ),
            }
        }

        if let Some(scorer) = &self.clip {
            self.score_clip(scorer, &category, &mut sites).await;
        }

        let review = match &self.reviewer {
            Some(llm) => self.review(llm.as_ref(), &category, &captured, &sites).await,
            None => None,
        };

        let report = assemble_report(&sites, review.as_ref(), self.clip_weight);
        info!(
            target: "compare",
            elapsed_ms = started.elapsed().as_millis() as u64,
            sites = report.ranking.len(),
            best = ?report.comparison.best_overall,
            "comparison.done\n{}",
            summary_table(&report)
        );
        Ok(report)
    }

    async fn persist(&self, capture: &SiteCapture) -> Result<SiteResults> {
        let name = &capture.site.name;
        let mut results = SiteResults {
            name: name.clone(),
            ..Default::default()
        };
        for (section, png) in capture.shots.iter() {
            let shot = self.store.save(name, section, png).await?;
            results.shots.insert(section, shot);
        }

        if let Some(host) = &self.image_host {
            let shots: Vec<StoredShot> = results.shots.values().cloned().collect();
            results.hosted = upload_site(host.as_ref(), name, &shots).await;
        }
        Ok(results)
    }

    async fn score_clip(&self, scorer: &Arc<ClipScorer>, category: &str, sites: &mut [SiteResults]) {
        let jobs = sites.iter().enumerate().flat_map(|(idx, site)| {
            site.shots.values().map(move |shot| {
                let scorer = Arc::clone(scorer);
                let category = category.to_string();
                let path = shot.path.clone();
                let section = shot.section;
                async move {
                    let res = tokio::task::spawn_blocking(move || {
                        scorer.score(&path, section, &category)
                    })
                    .await
                    .map_err(|e| SiteLensError::Vision(format!("clip task failed: {e}")))
                    .and_then(|r| r);
                    (idx, section, res)
                }
            })
        });

        for (idx, section, res) in join_all(jobs).await {
            let Some(site) = sites.get_mut(idx) else {
                continue;
            };
            match res {
                Ok(score) => {
                    debug!(
                        target: "compare.clip",
                        site = %site.name,
                        %section,
                        similarity = score.similarity,
                        normalized = score.normalized,
                        "clip scored"
                    );
                    site.clip.insert(section, score);
                }
                Err(e) => warn!(
                    target: "compare.clip",
                    site = %site.name,
                    %section,
                    error = %e,
                    "clip scoring failed; omitting"
                ),
            }
        }
    }

    async fn review(
        &self,
        llm: &dyn LlmClient,
        category: &str,
        captures: &[&SiteCapture],
        sites: &[SiteResults],
    ) -> Option<DesignReview> {
        let encoded = join_all(captures.iter().map(|capture| {
            let png = capture.shots.full.clone();
            async move {
                tokio::task::spawn_blocking(move || encode_for_llm(&png))
                    .await
                    .map_err(|e| SiteLensError::Llm(format!("encode task failed: {e}")))
                    .and_then(|r| r)
            }
        }))
        .await;

        let mut subjects = Vec::with_capacity(captures.len());
        for ((capture, site), image) in captures.iter().zip(sites).zip(encoded) {
            match image {
                Ok(image) => subjects.push(ReviewSubject {
                    name: capture.site.name.clone(),
                    url: capture.site.url.clone(),
                    image,
                    screenshot: site.shots.get(&Section::Full).map(|s| s.public_path.clone()),
                }),
                Err(e) => warn!(
                    target: "compare.review",
                    site = %capture.site.name,
                    error = %e,
                    "could not prepare screenshot for review"
                ),
            }
        }
        if subjects.is_empty() {
            return None;
        }

        match review_websites(llm, category, &subjects).await {
            Ok(review) => Some(review),
            Err(e) => {
                warn!(
                    target: "compare.review",
                    model = llm.model_name(),
                    error = %e,
                    "design review failed; continuing with CLIP scores only"
                );
                None
            }
        }
    }
}
