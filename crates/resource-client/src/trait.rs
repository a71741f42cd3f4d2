//! ResourceClient and EventRecorder traits
//!
//! These traits abstract the Kubernetes API so the reconciler can be driven
//! against in-memory fakes in unit tests. The concrete implementations live in
//! `client.rs` and `events.rs`; the fakes live in `mock/`.

use crate::error::StoreError;
use crds::Database;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;

/// Store operations used by the Database controller.
///
/// Every write carries the object's `resourceVersion`; a stale version fails
/// with [`StoreError::Conflict`]. Create/replace take the namespace and name
/// from the object's metadata.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    // Database
    async fn get_database(&self, namespace: &str, name: &str) -> Result<Database, StoreError>;
    /// Persist `status` only.
    async fn update_database_status(&self, database: &Database) -> Result<Database, StoreError>;
    /// Persist `metadata.finalizers` only.
    async fn update_database_finalizers(&self, database: &Database) -> Result<Database, StoreError>;

    // Secrets
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError>;
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // StatefulSets
    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, StoreError>;
    async fn create_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError>;
    async fn replace_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError>;
    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // Services
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError>;
    async fn create_service(&self, service: &Service) -> Result<Service, StoreError>;
    async fn replace_service(&self, service: &Service) -> Result<Service, StoreError>;

    // Ingresses
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, StoreError>;
    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError>;
    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError>;
    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // PersistentVolumeClaims
    /// List claims matching an equality label selector (`key=value[,key=value]`).
    async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, StoreError>;
    async fn delete_persistent_volume_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// Best-effort channel for human readable notices attached to a Database.
///
/// Publishing never fails the caller: implementations log and swallow errors.
#[async_trait::async_trait]
pub trait EventRecorder: Send + Sync {
    async fn publish(
        &self,
        database: &Database,
        event_type: EventType,
        reason: &str,
        action: &str,
        note: String,
    );
}
