//! Reconciliation logic for the Database CRD.
//!
//! One call to [`Reconciler::reconcile`] drives a single Database:
//! - `status`: condition bookkeeping with unchanged-write suppression
//! - `finalizer`: PVC and secret cleanup before the finalizer is released
//! - `secret`, `workload`, `service`, `ingress`: the child resources, run in
//!   that order because each step refers to what the previous ones created

pub mod finalizer;
pub mod ingress;
pub mod secret;
pub mod service;
pub mod status;
pub mod workload;

#[cfg(test)]
mod reconciler_test;

use crate::error::ControllerError;
use crds::{ConditionStatus, ConditionType, Database};
use finalizer::{add_finalizer, has_finalizer, remove_finalizer};
use status::find_condition;
use resource_client::{EventRecorder, EventType, ResourceClient, StoreError};
use tracing::{debug, error, info};

/// How the dispatcher should follow up on a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change.
    Done,
    /// Another writer raced us; run again after a fresh fetch.
    Requeue,
}

/// Map a lookup result to `None` on 404.
pub(crate) fn found<T>(result: Result<T, StoreError>) -> Result<Option<T>, ControllerError> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reconciles Database resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn ResourceClient + Send + Sync>,
    pub(crate) recorder: Box<dyn EventRecorder + Send + Sync>,
}

impl Reconciler {
    pub fn new(
        client: impl ResourceClient + 'static,
        recorder: impl EventRecorder + 'static,
    ) -> Self {
        Self {
            client: Box::new(client),
            recorder: Box::new(recorder),
        }
    }

    /// Reconcile the Database `namespace/name`.
    ///
    /// Write conflicts become [`ReconcileOutcome::Requeue`]; every other
    /// failure is returned for the dispatcher to back off on.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        match self.reconcile_database(namespace, name).await {
            Err(e) if e.is_conflict() => {
                info!("Conflict while reconciling Database {}/{}, requeueing: {}", namespace, name, e);
                Ok(ReconcileOutcome::Requeue)
            }
            other => other,
        }
    }

    async fn reconcile_database(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let Some(mut database) = found(self.client.get_database(namespace, name).await)? else {
            info!("Database {}/{} not found, ignoring since object must be deleted", namespace, name);
            return Ok(ReconcileOutcome::Done);
        };

        let no_conditions = database
            .status
            .as_ref()
            .is_none_or(|status| status.conditions.is_empty());
        if no_conditions {
            database = self
                .update_condition(
                    database,
                    ConditionType::Available,
                    ConditionStatus::Unknown,
                    "Reconciling",
                    "Starting reconciliation".to_string(),
                )
                .await?;
        }

        let deleting = database.metadata.deletion_timestamp.is_some();
        if deleting {
            if !has_finalizer(&database) {
                debug!("Database {}/{} is being deleted without our finalizer", namespace, name);
                return Ok(ReconcileOutcome::Done);
            }
            let mut database = self.finalize(database).await?;
            remove_finalizer(&mut database);
            self.client.update_database_finalizers(&database).await?;
            info!("Removed finalizer from Database {}/{}", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        if add_finalizer(&mut database) {
            info!("Adding finalizer to Database {}/{}", namespace, name);
            database = self.client.update_database_finalizers(&database).await?;
        }

        if let Err(e) = self.reconcile_children(&database).await {
            if !e.is_conflict() {
                error!("Failed to reconcile children of Database {}/{}: {}", namespace, name, e);
                self.recorder
                    .publish(&database, EventType::Warning, "ReconcileFailed", "Reconcile", e.to_string())
                    .await;
            }
            return Err(e);
        }

        let was_available = find_condition(&database, ConditionType::Available)
            .is_some_and(|c| c.status == ConditionStatus::True);
        let pods = 1 + database.spec.replica_count();
        self.update_condition(
            database,
            ConditionType::Available,
            ConditionStatus::True,
            "Reconciling",
            format!("StatefulSet for custom resource ({name}) with {pods} replicas created successfully"),
        )
        .await?;
        if !was_available {
            info!("Database {}/{} is available", namespace, name);
        }

        Ok(ReconcileOutcome::Done)
    }

    async fn reconcile_children(&self, database: &Database) -> Result<(), ControllerError> {
        self.reconcile_auth_secret(database).await?;
        self.reconcile_workloads(database).await?;
        self.reconcile_services(database).await?;
        self.reconcile_ingress(database).await?;
        Ok(())
    }
}
