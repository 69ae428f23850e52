mod common;

use serde_json::json;
use sitelens_common::{Result, Section, SiteLensError};
use sitelens_llm::gemini::GeminiClient;
use sitelens_llm::review::{review_websites, ReviewSubject};
use sitelens_llm::{InlineImage, LlmClient, LlmRequest};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key".into(), "gemini-2.0-flash".into())
        .unwrap()
        .with_retries(0)
        .with_endpoint(&server.uri())
        .unwrap()
}

fn reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"totalTokenCount": 42}
    })
}

fn subject(name: &str) -> ReviewSubject {
    ReviewSubject {
        name: name.to_string(),
        url: format!("https://{}.example", name.to_lowercase()),
        image: InlineImage::jpeg(vec![0xff, 0xd8, 0xff]),
        screenshot: Some(format!(
            "screenshots/{0}/{0}_full.png",
            name.to_lowercase()
        )),
    }
}

#[tokio::test]
async fn generate_sends_key_and_images() -> Result<()> {
    common::init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"ok\":true}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let req = LlmRequest::new("rate this")
        .with_image(InlineImage::png(vec![1, 2, 3]))
        .json();
    let resp = client.generate(&req).await?;
    assert_eq!(resp.text, "{\"ok\":true}");
    assert_eq!(resp.tokens_used, Some(42));
    Ok(())
}

#[tokio::test]
async fn safety_block_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(&LlmRequest::new("x"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("safety"));
}

#[tokio::test]
async fn empty_candidates_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "OTHER"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(&LlmRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteLensError::Llm(ref m) if m.contains("OTHER")));
}

#[tokio::test]
async fn api_errors_map_to_llm_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "API key not valid"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(&LlmRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteLensError::Llm(ref m) if m.contains("API key not valid")));
}

#[tokio::test]
async fn review_fills_screenshots_by_name() -> Result<()> {
    common::init_test_tracing();
    let server = MockServer::start().await;

    let review_json = json!({
        "websites": [
            {"name": "Beta", "overall_score": 6, "sections": {"header": {"score": 5}}},
            {"name": "alpha", "overall_score": "9", "sections": {}}
        ],
        "comparison": {"best_overall": "alpha", "summary": "alpha wins"}
    });
    let text = format!("```json\n{review_json}\n```");

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(&text)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let review = review_websites(
        &client,
        "ecommerce",
        &[subject("Alpha"), subject("Beta")],
    )
    .await?;

    let alpha = review.website("Alpha").expect("alpha reviewed");
    assert_eq!(
        alpha.screenshot.as_deref(),
        Some("screenshots/alpha/alpha_full.png")
    );
    assert_eq!(alpha.section_score(Section::Full), Some(0.9));
    let beta = review.website("beta").expect("beta reviewed");
    assert_eq!(beta.url, "https://beta.example");
    assert_eq!(beta.section_score(Section::Header), Some(0.5));
    assert_eq!(review.comparison.summary.as_deref(), Some("alpha wins"));
    Ok(())
}

#[tokio::test]
async fn review_renamed_sites_are_matched_by_position() -> Result<()> {
    let server = MockServer::start().await;

    let review_json = json!({
        "websites": [
            {"name": "Alpha Store", "overall_score": 8, "vision_improvements": null},
            {"name": "Beta", "overall_score": 4, "screenshot": "elsewhere.png"}
        ],
        "comparison": null
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(&review_json.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let review = review_websites(
        &client_for(&server),
        "ecommerce",
        &[subject("Alpha"), subject("Beta"), subject("Gamma")],
    )
    .await?;

    assert_eq!(review.websites.len(), 2);
    let alpha = review.website("Alpha").expect("renamed review keyed by site name");
    assert_eq!(alpha.url, "https://alpha.example");
    assert_eq!(
        alpha.screenshot.as_deref(),
        Some("screenshots/alpha/alpha_full.png")
    );
    assert_eq!(alpha.section_score(Section::Full), Some(0.8));
    let beta = review.website("Beta").expect("beta reviewed");
    assert_eq!(beta.screenshot.as_deref(), Some("elsewhere.png"));
    assert!(review.website("Gamma").is_none());
    Ok(())
}

#[tokio::test]
async fn review_without_subjects_skips_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let err = review_websites(&client_for(&server), "ecommerce", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SiteLensError::Validation(_)));
}

#[tokio::test]
#[cfg_attr(not(feature = "e2e"), ignore)]
async fn gemini_review_smoketest() -> Result<()> {
    common::init_test_tracing();
    let Ok(key) = std::env::var("GEMINI_API_KEY") else {
        tracing::debug!("Skipping: GEMINI_API_KEY not set");
        return Ok(());
    };
    let client = GeminiClient::new(key, sitelens_llm::DEFAULT_GEMINI_MODEL.into())?;
    assert!(client.health_check().await?);
    Ok(())
}
