use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sitelens_common::{Result, SiteLensError};
use sitelens_compare::{CompareRequest, Comparator, ComparisonReport, SiteSummary};
use sitelens_server::{router, AppState};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

enum Behaviour {
    Rank,
    Fail,
    Hang,
}

struct FakeComparator {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeComparator {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Comparator for FakeComparator {
    async fn compare(&self, request: &CompareRequest) -> Result<ComparisonReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Rank => Ok(ComparisonReport {
                ranking: request
                    .websites
                    .iter()
                    .map(|w| SiteSummary {
                        name: w.name.clone(),
                        header: Some(0.5),
                        main: None,
                        footer: None,
                        full: None,
                        overall: 0.5,
                    })
                    .collect(),
                ..Default::default()
            }),
            Behaviour::Fail => Err(SiteLensError::Browser("webdriver unreachable".into())),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ComparisonReport::default())
            }
        }
    }
}

fn app(comparator: Arc<FakeComparator>, dir: &Path) -> Router {
    let state = AppState::new(comparator, 1, Duration::from_millis(200));
    router(state, dir)
}

async fn post(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/compare_websites")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn compare_returns_report() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeComparator::new(Behaviour::Rank);
    let body = json!({
        "websites": [
            {"name": "Amazon", "url": "https://amazon.example"},
            {"name": "Flipkart", "url": "https://flipkart.example"}
        ]
    });

    let (status, v) = post(app(fake.clone(), tmp.path()), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["ranking"][1]["name"], "Flipkart");
    assert!(v["header"].as_array().unwrap().is_empty());
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bad_bodies_are_rejected_before_comparing() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeComparator::new(Behaviour::Rank);

    let (status, v) = post(app(fake.clone(), tmp.path()), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v, json!({"error": "No data provided"}));

    let (status, v) = post(app(fake.clone(), tmp.path()), "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "No data provided");

    let (status, v) = post(app(fake.clone(), tmp.path()), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "No data provided");

    let (status, v) = post(app(fake.clone(), tmp.path()), r#"{"websites": []}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "No websites provided");

    let (status, v) = post(
        app(fake.clone(), tmp.path()),
        r#"{"websites": [{"name": "Shop", "url": "javascript:alert(1)"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("unsupported url scheme"));

    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn engine_failures_are_server_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let body = r#"{"websites": [{"name": "Shop", "url": "https://shop.example"}]}"#;

    let (status, v) = post(app(FakeComparator::new(Behaviour::Fail), tmp.path()), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["error"], "Server error: Browser error: webdriver unreachable");
}

#[tokio::test]
async fn slow_comparisons_time_out() {
    let tmp = tempfile::tempdir().unwrap();
    let body = r#"{"websites": [{"name": "Shop", "url": "https://shop.example"}]}"#;

    let (status, v) = post(app(FakeComparator::new(Behaviour::Hang), tmp.path()), body).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(v["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn screenshots_are_served_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("shop")).unwrap();
    std::fs::write(tmp.path().join("shop/shop_header.png"), b"\x89PNG fake").unwrap();

    let app = app(FakeComparator::new(Behaviour::Rank), tmp.path());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/screenshots/shop/shop_header.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let missing = app
        .oneshot(
            Request::builder()
                .uri("/screenshots/shop/nope.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_cors() {
    let tmp = tempfile::tempdir().unwrap();
    let response = app(FakeComparator::new(Behaviour::Rank), tmp.path())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["status"], "ok");
}
