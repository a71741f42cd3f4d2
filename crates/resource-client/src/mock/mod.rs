//! Mock ResourceClient for unit testing
//!
//! This module provides in-memory implementations of `ResourceClient` and
//! `EventRecorder` so the reconciler can be exercised without an API server.
//!
//! - `store.rs` - generic namespaced store with resourceVersion checks
//! - `events.rs` - event recorder that keeps published events in memory

mod events;
mod store;

pub use events::{MockEventRecorder, RecordedEvent};

use crate::client_trait::ResourceClient;
use crate::error::StoreError;
use crds::Database;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use store::{matches_labels, parse_label_selector, ObjectStore};

/// Mock ResourceClient for testing
///
/// Objects live in memory keyed by namespace and name. Writes bump a shared
/// resourceVersion counter and enforce it the way the API server does, and
/// every call is appended to an operation log (`"<op> <ns>/<name>"`).
#[derive(Clone)]
pub struct MockResourceClient {
    pub(crate) databases: ObjectStore<Database>,
    pub(crate) secrets: ObjectStore<Secret>,
    pub(crate) stateful_sets: ObjectStore<StatefulSet>,
    pub(crate) services: ObjectStore<Service>,
    pub(crate) ingresses: ObjectStore<Ingress>,
    pub(crate) persistent_volume_claims: ObjectStore<PersistentVolumeClaim>,
    // One-shot failures keyed by operation name
    pub(crate) failures: Arc<Mutex<HashMap<String, StoreError>>>,
    pub(crate) operations: Arc<Mutex<Vec<String>>>,
    pub(crate) next_version: Arc<Mutex<u64>>,
}

impl Default for MockResourceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResourceClient").finish_non_exhaustive()
    }
}

impl MockResourceClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self {
            databases: ObjectStore::new("Database"),
            secrets: ObjectStore::new("Secret"),
            stateful_sets: ObjectStore::new("StatefulSet"),
            services: ObjectStore::new("Service"),
            ingresses: ObjectStore::new("Ingress"),
            persistent_volume_claims: ObjectStore::new("PersistentVolumeClaim"),
            failures: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            next_version: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a Database to the mock store (for test setup)
    ///
    /// Assigns a uid and resourceVersion when the object has none.
    pub fn add_database(&self, mut database: Database) -> Database {
        let version = self.next_version();
        if database.metadata.uid.is_none() {
            database.metadata.uid = Some(format!("uid-{version}"));
        }
        database.metadata.resource_version = Some(version.to_string());
        self.databases
            .insert(database.clone())
            .unwrap_or(database)
    }

    /// Add a PersistentVolumeClaim to the mock store (for test setup)
    pub fn add_persistent_volume_claim(&self, mut claim: PersistentVolumeClaim) {
        claim.metadata.resource_version = Some(self.next_version().to_string());
        let _ = self.persistent_volume_claims.insert(claim);
    }

    /// Add a Secret to the mock store (for test setup)
    pub fn add_secret(&self, mut secret: Secret) {
        secret.metadata.resource_version = Some(self.next_version().to_string());
        let _ = self.secrets.insert(secret);
    }

    /// Simulate a delete request from a user.
    ///
    /// With finalizers present the object gets a deletionTimestamp and stays;
    /// otherwise it is removed immediately.
    pub fn request_database_deletion(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let database = self.databases.get(namespace, name)?;
        let has_finalizers = database
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty());
        if !has_finalizers {
            self.databases.remove(namespace, name)?;
            return Ok(());
        }
        let timestamp: Time = serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z"))?;
        let version = self.next_version();
        let mut current = database;
        current.metadata.resource_version = None;
        self.databases.update(&current, version, |stored| {
            stored.metadata.deletion_timestamp = Some(timestamp);
        })?;
        Ok(())
    }

    /// Make the next call to `operation` fail with `error`
    pub fn fail_next(&self, operation: &str, error: StoreError) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), error);
    }

    /// Every call made so far, in order
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    /// Number of calls to `operation`
    pub fn count(&self, operation: &str) -> usize {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.split(' ').next() == Some(operation))
            .count()
    }

    /// Forget the operation log
    pub fn clear_operations(&self) {
        self.operations.lock().unwrap().clear();
    }

    /// Stored Database, if any
    pub fn database(&self, namespace: &str, name: &str) -> Option<Database> {
        self.databases.get(namespace, name).ok()
    }

    /// Stored Secret, if any
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.get(namespace, name).ok()
    }

    /// Stored StatefulSet, if any
    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.stateful_sets.get(namespace, name).ok()
    }

    /// Stored Service, if any
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.get(namespace, name).ok()
    }

    /// Stored Ingress, if any
    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.ingresses.get(namespace, name).ok()
    }

    /// True when the PersistentVolumeClaim is still stored
    pub fn has_persistent_volume_claim(&self, namespace: &str, name: &str) -> bool {
        self.persistent_volume_claims.contains(namespace, name)
    }

    /// Overwrite a stored Database as another writer would, bumping its version
    pub fn touch_database(&self, namespace: &str, name: &str) -> Result<Database, StoreError> {
        let mut current = self.databases.get(namespace, name)?;
        current.metadata.resource_version = None;
        let version = self.next_version();
        self.databases.update(&current, version, |_| {})
    }

    pub(crate) fn next_version(&self) -> u64 {
        let mut version = self.next_version.lock().unwrap();
        let current = *version;
        *version += 1;
        current
    }

    fn record(&self, operation: &str, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.operations
            .lock()
            .unwrap()
            .push(format!("{operation} {namespace}/{name}"));
        match self.failures.lock().unwrap().remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_in<K: kube::Resource + Clone>(
        &self,
        store: &ObjectStore<K>,
        operation: &str,
        obj: &K,
    ) -> Result<K, StoreError> {
        let (namespace, name) = crate::client::object_key(obj)?;
        self.record(operation, &namespace, &name)?;
        let version = self.next_version();
        store.create(obj, version, format!("uid-{version}"))
    }

    fn replace_in<K: kube::Resource + Clone>(
        &self,
        store: &ObjectStore<K>,
        operation: &str,
        obj: &K,
    ) -> Result<K, StoreError> {
        let (namespace, name) = crate::client::object_key(obj)?;
        self.record(operation, &namespace, &name)?;
        let version = self.next_version();
        let replacement = obj.clone();
        store.update(obj, version, move |stored| {
            let uid = stored.meta().uid.clone();
            *stored = replacement;
            stored.meta_mut().uid = uid;
        })
    }

    fn delete_in<K: kube::Resource + Clone>(
        &self,
        store: &ObjectStore<K>,
        operation: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.record(operation, namespace, name)?;
        store.remove(namespace, name).map(|_| ())
    }
}

#[async_trait::async_trait]
impl ResourceClient for MockResourceClient {
    async fn get_database(&self, namespace: &str, name: &str) -> Result<Database, StoreError> {
        self.record("get_database", namespace, name)?;
        self.databases.get(namespace, name)
    }

    async fn update_database_status(&self, database: &Database) -> Result<Database, StoreError> {
        let (namespace, name) = crate::client::object_key(database)?;
        self.record("update_database_status", &namespace, &name)?;
        let version = self.next_version();
        let status = database.status.clone();
        self.databases.update(database, version, move |stored| {
            stored.status = status;
        })
    }

    async fn update_database_finalizers(&self, database: &Database) -> Result<Database, StoreError> {
        let (namespace, name) = crate::client::object_key(database)?;
        self.record("update_database_finalizers", &namespace, &name)?;
        let version = self.next_version();
        let finalizers = database.metadata.finalizers.clone();
        let updated = self.databases.update(database, version, move |stored| {
            stored.metadata.finalizers = finalizers;
        })?;
        let released = updated.metadata.deletion_timestamp.is_some()
            && updated
                .metadata
                .finalizers
                .as_ref()
                .is_none_or(Vec::is_empty);
        if released {
            self.databases.remove(&namespace, &name)?;
        }
        Ok(updated)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.record("get_secret", namespace, name)?;
        self.secrets.get(namespace, name)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.create_in(&self.secrets, "create_secret", secret)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_in(&self.secrets, "delete_secret", namespace, name)
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, StoreError> {
        self.record("get_stateful_set", namespace, name)?;
        self.stateful_sets.get(namespace, name)
    }

    async fn create_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError> {
        self.create_in(&self.stateful_sets, "create_stateful_set", stateful_set)
    }

    async fn replace_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError> {
        self.replace_in(&self.stateful_sets, "replace_stateful_set", stateful_set)
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_in(&self.stateful_sets, "delete_stateful_set", namespace, name)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        self.record("get_service", namespace, name)?;
        self.services.get(namespace, name)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, StoreError> {
        self.create_in(&self.services, "create_service", service)
    }

    async fn replace_service(&self, service: &Service) -> Result<Service, StoreError> {
        self.replace_in(&self.services, "replace_service", service)
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, StoreError> {
        self.record("get_ingress", namespace, name)?;
        self.ingresses.get(namespace, name)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError> {
        self.create_in(&self.ingresses, "create_ingress", ingress)
    }

    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError> {
        self.replace_in(&self.ingresses, "replace_ingress", ingress)
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_in(&self.ingresses, "delete_ingress", namespace, name)
    }

    async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, StoreError> {
        self.record("list_persistent_volume_claims", namespace, label_selector)?;
        let terms = parse_label_selector(label_selector);
        let mut claims: Vec<_> = self
            .persistent_volume_claims
            .list(namespace)
            .into_iter()
            .filter(|claim| matches_labels(claim, &terms))
            .collect();
        claims.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(claims)
    }

    async fn delete_persistent_volume_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_in(
            &self.persistent_volume_claims,
            "delete_persistent_volume_claim",
            namespace,
            name,
        )
    }
}
