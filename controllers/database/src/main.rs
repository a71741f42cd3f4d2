//! Database Controller
//!
//! Reconciles `libsql.ahti.io/v1` Database resources into a running sqld
//! deployment: auth key Secret, primary (and optional replica) StatefulSets,
//! headless and routable Services, and an optional Ingress.

mod backoff;
mod config;
mod controller;
mod error;
mod keys;
mod metrics;
mod names;
mod owner;
mod reconciler;
mod server;
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Database Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Concurrency: {}", config.concurrency);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Backoff: {:?} .. {:?}", config.backoff_base, config.backoff_max);
    info!("  Metrics port: {}", config.metrics_port);

    metrics::register_metrics()?;

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
