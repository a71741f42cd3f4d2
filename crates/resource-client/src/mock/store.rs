//! Generic namespaced object store for MockResourceClient
//!
//! Mimics the API server's optimistic concurrency: every write bumps a
//! global resourceVersion and replaces carrying a stale version fail.

use crate::client::object_key;
use crate::error::StoreError;
use kube::Resource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub(crate) type Key = (String, String);

#[derive(Clone)]
pub(crate) struct ObjectStore<K> {
    kind: &'static str,
    objects: Arc<Mutex<HashMap<Key, K>>>,
}

impl<K: Resource + Clone> ObjectStore<K> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn not_found(&self, namespace: &str, name: &str) -> StoreError {
        StoreError::NotFound(format!("{} {}/{} not found", self.kind, namespace, name))
    }

    pub(crate) fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| self.not_found(namespace, name))
    }

    pub(crate) fn list(&self, namespace: &str) -> Vec<K> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    pub(crate) fn contains(&self, namespace: &str, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Insert without any checks (test setup).
    pub(crate) fn insert(&self, obj: K) -> Result<K, StoreError> {
        let key = object_key(&obj)?;
        self.objects.lock().unwrap().insert(key, obj.clone());
        Ok(obj)
    }

    pub(crate) fn create(&self, obj: &K, resource_version: u64, uid: String) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.clone(), name.clone());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "{} {}/{} already exists",
                self.kind, namespace, name
            )));
        }
        let mut created = obj.clone();
        let meta = created.meta_mut();
        meta.resource_version = Some(resource_version.to_string());
        meta.uid = Some(uid);
        objects.insert(key, created.clone());
        Ok(created)
    }

    /// Apply `mutate` to the stored copy of `obj`.
    ///
    /// Fails with Conflict when `obj` carries a resourceVersion that is not
    /// the stored one; an unset version writes unconditionally.
    pub(crate) fn update(
        &self,
        obj: &K,
        resource_version: u64,
        mutate: impl FnOnce(&mut K),
    ) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.clone(), name.clone());
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| self.not_found(&namespace, &name))?;
        if let Some(expected) = obj.meta().resource_version.as_ref() {
            if stored.meta().resource_version.as_ref() != Some(expected) {
                return Err(StoreError::Conflict(format!(
                    "the object has been modified; please apply your changes to the latest version: {} {}/{}",
                    self.kind, namespace, name
                )));
            }
        }
        mutate(stored);
        stored.meta_mut().resource_version = Some(resource_version.to_string());
        Ok(stored.clone())
    }

    pub(crate) fn remove(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| self.not_found(namespace, name))
    }
}

/// Parse an equality-only selector (`a=b,c=d`).
pub(crate) fn parse_label_selector(selector: &str) -> Vec<(String, String)> {
    selector
        .split(',')
        .filter_map(|term| {
            let (key, value) = term.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// True when every selector term matches the object's labels.
pub(crate) fn matches_labels<K: Resource>(obj: &K, terms: &[(String, String)]) -> bool {
    let labels = obj.meta().labels.as_ref();
    terms.iter().all(|(key, value)| {
        labels
            .and_then(|l| l.get(key))
            .is_some_and(|actual| actual == value)
    })
}
