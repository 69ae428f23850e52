use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use sitelens_common::{Result, Section, SiteLensError, WebsiteInput};
use sitelens_compare::{CompareRequest, Comparator, ComparisonEngine};
use sitelens_drivers::{BrowserCapturer, SectionShots, SiteCapture};
use sitelens_llm::{LlmClient, LlmRequest, LlmResponse};
use sitelens_storage::{HostedImage, ImageHost, ScreenshotStore};
use sitelens_vision::{ClipScorer, ImageTextEncoder};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([40, 80, 120, 255])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Captures every site except ones named "Broken". Sites whose name starts
/// with "Flip" have no main section.
#[derive(Default)]
struct FakeCapturer {
    calls: AtomicUsize,
}

#[async_trait]
impl BrowserCapturer for FakeCapturer {
    async fn capture(&self, sites: &[WebsiteInput]) -> Result<Vec<SiteCapture>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sites
            .iter()
            .filter(|s| s.name != "Broken")
            .map(|site| SiteCapture {
                site: site.clone(),
                shots: SectionShots {
                    header: png(8, 2),
                    main: (!site.name.starts_with("Flip")).then(|| png(8, 4)),
                    footer: Some(png(8, 2)),
                    full: png(8, 8),
                },
            })
            .collect())
    }
}

/// Amazon screenshots match the prompt exactly; everything else sits at a
/// cosine of 0.6.
struct FakeEncoder;

impl ImageTextEncoder for FakeEncoder {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let file = path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
        if file.starts_with("amazon") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.6, 0.8])
        }
    }

    fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

struct FakeReviewer {
    reply: std::result::Result<String, String>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl FakeReviewer {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for FakeReviewer {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(LlmResponse {
                text: text.clone(),
                model: Some("fake".into()),
                tokens_used: None,
                finish_reason: Some("STOP".into()),
            }),
            Err(msg) => Err(SiteLensError::Llm(msg.clone())),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "fake-reviewer"
    }
}

struct FakeHost;

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, path: &Path, public_id: &str, folder: &str) -> Result<HostedImage> {
        assert!(path.exists());
        Ok(HostedImage {
            public_id: format!("{folder}/{public_id}"),
            url: self.url_for(public_id, folder),
        })
    }

    async fn delete(&self, _public_id: &str, _folder: &str) -> Result<()> {
        Ok(())
    }

    fn url_for(&self, public_id: &str, folder: &str) -> String {
        format!("https://cdn.test/{folder}/{public_id}")
    }

    fn base_folder(&self) -> &str {
        "website_screenshots"
    }
}

const REVIEW: &str = r#"```json
{
  "websites": [
    {
      "name": "Amazon",
      "overall_score": 6,
      "sections": {
        "header": {"score": 6, "strengths": ["dense navigation"], "weaknesses": [], "recommendations": []},
        "main_content": {"score": "7"},
        "footer": {"score": 5}
      }
    },
    {
      "name": "Flipkart",
      "overall_score": 9,
      "sections": {
        "header": {"score": 9, "recommendations": ["larger search box"]},
        "footer": {"score": 8}
      }
    }
  ],
  "comparison": {"best_overall": "Flipkart", "summary": "Flipkart feels cleaner."}
}
```"#;

fn request() -> CompareRequest {
    CompareRequest::new(
        vec![
            WebsiteInput::new("Amazon", "https://amazon.example"),
            WebsiteInput::new("Flipkart", "https://flipkart.example"),
            WebsiteInput::new("Broken", "https://broken.example"),
        ],
        "ecommerce",
    )
}

fn engine(dir: &Path) -> ComparisonEngine {
    let clip = ClipScorer::new(Arc::new(FakeEncoder)).with_preprocess(false);
    ComparisonEngine::new(Arc::new(FakeCapturer::default()), ScreenshotStore::new(dir))
        .with_clip(Arc::new(clip))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn clip_only_comparison_ranks_and_saves() {
    let tmp = tempfile::tempdir().unwrap();
    let report = engine(tmp.path()).compare(&request()).await.unwrap();

    assert_eq!(report.header.len(), 2);
    assert_eq!(report.header[0].name, "Amazon");
    assert!(close(report.header[0].score, 1.0));
    assert!(close(report.header[1].score, 0.8));
    assert_eq!(report.header[0].path, "screenshots/amazon/amazon_header.png");
    assert_eq!(report.header[0].gemini_score, None);

    // Flipkart has no main section
    assert_eq!(report.main.len(), 1);
    assert_eq!(report.main[0].name, "Amazon");

    assert!(tmp.path().join("amazon/amazon_full.png").exists());
    assert!(tmp.path().join("flipkart/flipkart_footer.png").exists());
    assert!(!tmp.path().join("broken").exists());

    assert_eq!(report.ranking[0].name, "Amazon");
    assert_eq!(report.best[&Section::Footer], "Amazon");
    assert_eq!(report.comparison.best_overall.as_deref(), Some("Amazon"));
    assert!(report.websites.is_empty());
}

#[tokio::test]
async fn review_scores_are_blended_in() {
    let tmp = tempfile::tempdir().unwrap();
    let reviewer = Arc::new(FakeReviewer::replying(REVIEW));
    let engine = engine(tmp.path()).with_reviewer(reviewer.clone());

    let report = engine.compare(&request()).await.unwrap();

    let seen = reviewer.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].images.len(), 2);
    assert!(seen[0].json_output);
    assert!(seen[0].prompt.contains("Amazon, Flipkart"));

    // Amazon header: (1.0 + 0.6) / 2, Flipkart header: (0.8 + 0.9) / 2
    assert_eq!(report.header[0].name, "Flipkart");
    assert!(close(report.header[0].score, 0.85));
    assert!(close(report.header[1].score, 0.8));
    assert_eq!(
        report.header[0].gemini_recommendations,
        vec!["larger search box".to_string()]
    );
    assert_eq!(report.header[1].gemini_strengths, vec!["dense navigation".to_string()]);

    let amazon_main = &report.main[0];
    assert_eq!(amazon_main.gemini_score, Some(0.7));

    let full = report
        .full
        .iter()
        .find(|e| e.name == "Flipkart")
        .unwrap();
    let details = full.details.as_ref().unwrap();
    assert_eq!(details.screenshot.as_deref(), Some("screenshots/flipkart/flipkart_full.png"));
    assert_eq!(details.url, "https://flipkart.example");

    assert_eq!(report.websites.len(), 2);
    assert_eq!(report.comparison.best_overall.as_deref(), Some("Flipkart"));
    assert_eq!(report.comparison.summary.as_deref(), Some("Flipkart feels cleaner."));
}

#[tokio::test]
async fn failed_review_falls_back_to_clip() {
    let tmp = tempfile::tempdir().unwrap();
    let reviewer = Arc::new(FakeReviewer::failing("quota exhausted"));
    let engine = engine(tmp.path()).with_reviewer(reviewer.clone());

    let report = engine.compare(&request()).await.unwrap();

    assert_eq!(reviewer.seen.lock().unwrap().len(), 1);
    assert_eq!(report.header[0].name, "Amazon");
    assert!(report.header.iter().all(|e| e.gemini_score.is_none()));
    assert!(report.websites.is_empty());
}

#[tokio::test]
async fn review_alone_scores_without_clip() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = ComparisonEngine::new(
        Arc::new(FakeCapturer::default()),
        ScreenshotStore::new(tmp.path()),
    )
    .with_reviewer(Arc::new(FakeReviewer::replying(REVIEW)));

    let report = engine.compare(&request()).await.unwrap();

    assert_eq!(report.full[0].name, "Flipkart");
    assert!(close(report.full[0].score, 0.9));
    assert_eq!(report.full[0].clip_score, None);
    assert_eq!(report.full[0].criteria.clarity, 0.9);
    // Flipkart's review has no main_content rating and there is no CLIP score
    assert!(report.main.iter().all(|e| e.name != "Flipkart"));
}

#[tokio::test]
async fn mirrored_urls_are_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(tmp.path()).with_image_host(Arc::new(FakeHost));

    let report = engine.compare(&request()).await.unwrap();

    let footer = report.footer.iter().find(|e| e.name == "Flipkart").unwrap();
    assert_eq!(
        footer.cloudinary_url.as_deref(),
        Some("https://cdn.test/website_screenshots/flipkart/flipkart_footer")
    );
}

#[tokio::test]
async fn nothing_captured_gives_empty_report() {
    let tmp = tempfile::tempdir().unwrap();
    let reviewer = Arc::new(FakeReviewer::replying(REVIEW));
    let engine = engine(tmp.path()).with_reviewer(reviewer.clone());
    let req = CompareRequest::new(
        vec![WebsiteInput::new("Broken", "https://broken.example")],
        "ecommerce",
    );

    let report = engine.compare(&req).await.unwrap();

    assert!(report.is_empty());
    assert!(report.ranking.is_empty());
    assert!(reviewer.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_requests_never_reach_the_browser() {
    let tmp = tempfile::tempdir().unwrap();
    let capturer = Arc::new(FakeCapturer::default());
    let engine = ComparisonEngine::new(capturer.clone(), ScreenshotStore::new(tmp.path()));
    let comparator: &dyn Comparator = &engine;

    let err = comparator
        .compare(&CompareRequest::new(vec![], "ecommerce"))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteLensError::Validation(_)));

    let err = comparator
        .compare(&CompareRequest::new(
            vec![WebsiteInput::new("Shop", "file:///etc/passwd")],
            "ecommerce",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteLensError::Validation(_)));
    assert_eq!(capturer.calls.load(Ordering::SeqCst), 0);
}
