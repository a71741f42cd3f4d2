//! Kubernetes-backed ResourceClient

use crate::error::StoreError;
use crate::client_trait::ResourceClient;
use crds::Database;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// ResourceClient backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient").finish_non_exhaustive()
    }
}

/// Namespace and name from an object's metadata.
pub(crate) fn object_key<K: Resource>(obj: &K) -> Result<(String, String), StoreError> {
    let meta = obj.meta();
    let name = meta
        .name
        .clone()
        .ok_or_else(|| StoreError::InvalidObject("object missing metadata.name".to_string()))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or_else(|| StoreError::InvalidObject(format!("{name} missing metadata.namespace")))?;
    Ok((namespace, name))
}

impl KubeResourceClient {
    /// Wrap an existing kube client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn create<K>(&self, obj: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = object_key(obj)?;
        debug!("Creating {} {}/{}", K::kind(&Default::default()), namespace, name);
        Ok(self.api::<K>(&namespace).create(&PostParams::default(), obj).await?)
    }

    async fn replace<K>(&self, obj: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = object_key(obj)?;
        debug!("Replacing {} {}/{}", K::kind(&Default::default()), namespace, name);
        Ok(self
            .api::<K>(&namespace)
            .replace(&name, &PostParams::default(), obj)
            .await?)
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        debug!("Deleting {} {}/{}", K::kind(&Default::default()), namespace, name);
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    /// Merge patch that pins `metadata.resourceVersion`, so the API server
    /// rejects it with 409 when the caller's copy is stale.
    fn versioned_patch(database: &Database, body: serde_json::Value) -> Result<serde_json::Value, StoreError> {
        let resource_version = database
            .metadata
            .resource_version
            .clone()
            .ok_or_else(|| StoreError::InvalidObject("Database missing metadata.resourceVersion".to_string()))?;
        let mut patch = body;
        patch["metadata"]["resourceVersion"] = serde_json::Value::String(resource_version);
        Ok(patch)
    }
}

#[async_trait::async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get_database(&self, namespace: &str, name: &str) -> Result<Database, StoreError> {
        self.get(namespace, name).await
    }

    async fn update_database_status(&self, database: &Database) -> Result<Database, StoreError> {
        let (namespace, name) = object_key(database)?;
        let patch = Self::versioned_patch(
            database,
            serde_json::json!({ "metadata": {}, "status": database.status }),
        )?;
        Ok(self
            .api::<Database>(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn update_database_finalizers(&self, database: &Database) -> Result<Database, StoreError> {
        let (namespace, name) = object_key(database)?;
        let finalizers = database.metadata.finalizers.clone().unwrap_or_default();
        let patch = Self::versioned_patch(
            database,
            serde_json::json!({ "metadata": { "finalizers": finalizers } }),
        )?;
        Ok(self
            .api::<Database>(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.create(secret).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<Secret>(namespace, name).await
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError> {
        self.create(stateful_set).await
    }

    async fn replace_stateful_set(&self, stateful_set: &StatefulSet) -> Result<StatefulSet, StoreError> {
        self.replace(stateful_set).await
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<StatefulSet>(namespace, name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service, StoreError> {
        self.create(service).await
    }

    async fn replace_service(&self, service: &Service) -> Result<Service, StoreError> {
        self.replace(service).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError> {
        self.create(ingress).await
    }

    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError> {
        self.replace(ingress).await
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<Ingress>(namespace, name).await
    }

    async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, StoreError> {
        let params = ListParams::default().labels(label_selector);
        let list = self.api::<PersistentVolumeClaim>(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn delete_persistent_volume_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<PersistentVolumeClaim>(namespace, name).await
    }
}
