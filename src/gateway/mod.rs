//! Execution gateway — the request/response boundary.
//!
//! One synchronous pipeline per request: shape validation → static policy
//! scan → workbench execution under limits → serialized result. A bounded
//! semaphore caps concurrent executions so a burst cannot exceed the
//! container's budget; excess requests wait briefly for a permit and are
//! then rejected with an explicit backpressure status, never dropped.

mod handlers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::workbench::Limits;
use crate::workshop::Workshop;

/// Shared handler state. Cheap to clone; the workshop reference is the
/// process-wide registry, never a copy.
#[derive(Clone)]
pub struct AppState {
    pub workshop: &'static Workshop,
    pub limits: Arc<Limits>,
    /// Worker permits — the global concurrency cap.
    pub permits: Arc<Semaphore>,
    /// How long a request may wait for a permit before backpressure.
    pub queue_wait: Duration,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            workshop: Workshop::global(),
            limits: Arc::new(config.limits.to_limits()),
            permits: Arc::new(Semaphore::new(config.gateway.max_concurrent)),
            queue_wait: Duration::from_millis(config.gateway.queue_wait_ms),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/healthz", get(handlers::healthz))
        .route("/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until ctrl-c.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::new(&config);
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, draining in-flight requests");
        })
        .await
        .context("gateway server failed")?;
    Ok(())
}
