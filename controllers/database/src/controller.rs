//! Main controller implementation.
//!
//! Wires the kube client into the reconciler, then runs the Database watcher
//! next to the metrics/probe server until either exits.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::server::{serve_probes, Readiness};
use crate::watcher::{watch_databases, Context};
use kube::Client;
use resource_client::{KubeEventRecorder, KubeResourceClient};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Name reported on Events published by the controller.
const CONTROLLER_NAME: &str = "database-controller";

/// Main controller for Database resources.
pub struct Controller {
    database_watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Database Controller");

        let kube_client = Client::try_default()
            .await
            .map_err(|e| ControllerError::Store(e.into()))?;

        let reconciler = Reconciler::new(
            KubeResourceClient::new(kube_client.clone()),
            KubeEventRecorder::new(kube_client.clone(), CONTROLLER_NAME),
        );
        let ctx = Arc::new(Context::new(reconciler, &config));

        let ready = Readiness::default();
        let server = {
            let ready = ready.clone();
            let port = config.metrics_port;
            tokio::spawn(async move { serve_probes(port, ready).await })
        };

        let database_watcher = {
            let namespace = config.namespace.clone();
            let concurrency = config.concurrency;
            tokio::spawn(async move {
                watch_databases(kube_client, namespace.as_deref(), concurrency, ctx, ready).await
            })
        };

        Ok(Self {
            database_watcher,
            server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Database Controller running");

        tokio::select! {
            result = &mut self.database_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Database watcher panicked: {e}")))??;
                info!("Database watcher stopped");
            }
            result = &mut self.server => {
                result.map_err(|e| ControllerError::Watch(format!("HTTP server panicked: {e}")))??;
                info!("HTTP server stopped");
            }
        }

        Ok(())
    }
}
