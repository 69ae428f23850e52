//! HTTP front end for the comparison pipeline.

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, AppState};

use anyhow::Context;
use sitelens_compare::Comparator;
use sitelens_config::SiteLensConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bind `config.server.bind` and serve until Ctrl-C.
pub async fn serve(config: &SiteLensConfig, comparator: Arc<dyn Comparator>) -> anyhow::Result<()> {
    let state = AppState::new(
        comparator,
        config.server.max_concurrent_comparisons,
        Duration::from_secs(config.server.request_timeout_secs),
    );
    let app = router(state, config.screenshots.dir.clone());

    tokio::fs::create_dir_all(&config.screenshots.dir)
        .await
        .with_context(|| format!("creating {}", config.screenshots.dir.display()))?;

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(
        target: "server",
        addr = %listener.local_addr()?,
        screenshots = %config.screenshots.dir.display(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!(target: "server", "shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(target: "server", "ctrl-c received; draining"),
        Err(e) => tracing::warn!(target: "server", error = %e, "could not listen for ctrl-c"),
    }
}
