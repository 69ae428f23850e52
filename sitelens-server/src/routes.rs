use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sitelens_compare::{CompareRequest, Comparator, ComparisonReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub comparator: Arc<dyn Comparator>,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(
        comparator: Arc<dyn Comparator>,
        max_concurrent: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            comparator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            request_timeout,
        }
    }
}

/// ```text
/// POST /compare_websites     run a comparison, returns the report
/// GET  /screenshots/{*path}  saved section screenshots
/// GET  /health
/// ```
pub fn router(state: AppState, screenshots_dir: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/compare_websites", post(compare_websites))
        .route("/health", get(health))
        .with_state(state)
        .nest_service("/screenshots", ServeDir::new(screenshots_dir.into()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Parsed by hand so a missing, malformed or empty (`{}`, `null`) body all
/// get the same message.
fn parse_request(body: &[u8]) -> Result<CompareRequest, ApiError> {
    let no_data = || ApiError::bad_request("No data provided");
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(no_data());
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "server", error = %e, "unparseable request body");
        no_data()
    })?;
    match &value {
        Value::Object(fields) if !fields.is_empty() => {}
        _ => return Err(no_data()),
    }
    serde_json::from_value::<CompareRequest>(value).map_err(|e| {
        tracing::debug!(target: "server", error = %e, "request body has the wrong shape");
        no_data()
    })
}

async fn compare_websites(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ComparisonReport>, ApiError> {
    let request = parse_request(&body)?;
    if request.websites.is_empty() {
        return Err(ApiError::bad_request("No websites provided"));
    }
    request.validate()?;

    let started = Instant::now();
    tracing::info!(
        target: "server",
        sites = request.websites.len(),
        category = request.category(),
        "compare request accepted"
    );

    let work = async {
        let _permit = state
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::internal("comparison queue closed"))?;
        state.comparator.compare(&request).await.map_err(ApiError::from)
    };

    let report = match tokio::time::timeout(state.request_timeout, work).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ApiError::timeout(format!(
                "Comparison timed out after {}s",
                state.request_timeout.as_secs()
            )))
        }
    };

    tracing::info!(
        target: "server",
        elapsed_ms = started.elapsed().as_millis() as u64,
        ranked = report.ranking.len(),
        "compare request done"
    );
    Ok(Json(report))
}
