//! Kubernetes resource watcher.
//!
//! Drives [`Reconciler`] from a kube_runtime::Controller watching Databases
//! and the children they own. kube_runtime never runs two reconciliations for
//! the same object at once; distinct objects run in parallel up to the
//! configured concurrency.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics;
use crate::names::MANAGED_BY_LABEL;
use crate::owner::{database_key, owner_of};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::server::Readiness;
use crds::Database;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client};
use kube_runtime::{controller::{Action, Config as RuntimeConfig}, watcher, Controller};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconciliation.
pub struct Context {
    pub reconciler: Reconciler,
    pub backoff: BackoffTracker,
    pub reconcile_timeout: Duration,
    pub requeue_interval: Duration,
}

impl Context {
    pub fn new(reconciler: Reconciler, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            backoff: BackoffTracker::new(config.backoff_base, config.backoff_max),
            reconcile_timeout: config.reconcile_timeout,
            requeue_interval: config.requeue_interval,
        }
    }
}

/// Run `fut` with a deadline; on expiry the future is dropped, abandoning
/// any store call still in flight.
pub async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, ControllerError>>,
) -> Result<T, ControllerError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ControllerError::Timeout(deadline.as_secs())),
    }
}

/// Reconcile one Database and translate the outcome into a controller action.
pub async fn reconcile(database: Arc<Database>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let (namespace, name) = database_key(&database)?;
    let key = format!("{namespace}/{name}");
    debug!("Reconciling Database {}", key);

    metrics::increment_reconciliations();
    let started = Instant::now();
    let result = with_deadline(ctx.reconcile_timeout, ctx.reconciler.reconcile(&namespace, &name)).await;
    metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());

    match result? {
        ReconcileOutcome::Done => {
            ctx.backoff.reset(&key);
            Ok(Action::await_change())
        }
        ReconcileOutcome::Requeue => {
            metrics::increment_reconciliation_requeues();
            ctx.backoff.reset(&key);
            Ok(Action::requeue(ctx.requeue_interval))
        }
    }
}

/// Back off exponentially per Database after a failed reconciliation.
pub fn error_policy(database: Arc<Database>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    metrics::increment_reconciliation_errors();
    let key = match database_key(&database) {
        Ok((namespace, name)) => format!("{namespace}/{name}"),
        Err(_) => String::new(),
    };
    let delay = ctx.backoff.next_delay(&key);
    error!("Reconciliation error for Database {}: {} (retrying in {:?})", key, error, delay);
    Action::requeue(delay)
}

/// Watch Databases and their children until the stream ends.
pub async fn watch_databases(
    client: Client,
    namespace: Option<&str>,
    concurrency: u16,
    ctx: Arc<Context>,
    ready: Readiness,
) -> Result<(), ControllerError> {
    fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::all(client.clone()),
        }
    }

    info!("Starting Database watcher");

    // Children are found through their owner reference; the label keeps
    // unrelated objects out of the watch.
    let children = || watcher::Config::default().labels(MANAGED_BY_LABEL);

    let reconciliations = Controller::new(api::<Database>(&client, namespace), watcher::Config::default())
        .watches(api::<Secret>(&client, namespace), children(), |obj| owner_of(&obj))
        .watches(api::<StatefulSet>(&client, namespace), children(), |obj| owner_of(&obj))
        .watches(api::<Service>(&client, namespace), children(), |obj| owner_of(&obj))
        .watches(api::<Ingress>(&client, namespace), children(), |obj| owner_of(&obj))
        .with_config(RuntimeConfig::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx);

    ready.store(true, Ordering::Release);
    info!("Database watcher ready");

    reconciliations
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled Database {}", obj),
                Err(e) => warn!("Controller error for Database: {}", e),
            }
        })
        .await;

    ready.store(false, Ordering::Release);
    Ok(())
}
