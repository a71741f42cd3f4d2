//! Metrics and probe endpoints served next to the watcher.
//!
//! `/healthz` answers as long as the process runs. `/readyz` answers once the
//! Database watcher has built its controller stream.

use crate::error::ControllerError;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Flag the watcher raises once it is running.
pub type Readiness = Arc<AtomicBool>;

fn probes(ready: Readiness) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/readyz", get(readiness))
        .with_state(ready)
}

/// Serve the probe router on `0.0.0.0:port` until the listener fails.
pub async fn serve_probes(port: u16, ready: Readiness) -> Result<(), ControllerError> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Serving metrics and probes on port {}", port);
    axum::serve(listener, probes(ready)).await?;
    Ok(())
}

async fn render_metrics() -> impl IntoResponse {
    let mut body = Vec::new();
    match TextEncoder::new().encode(&crate::metrics::REGISTRY.gather(), &mut body) {
        Ok(()) => (StatusCode::OK, [("content-type", prometheus::TEXT_FORMAT)], body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, [("content-type", "text/plain")], Vec::new())
        }
    }
}

async fn readiness(State(ready): State<Readiness>) -> StatusCode {
    if ready.load(Ordering::Acquire) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
