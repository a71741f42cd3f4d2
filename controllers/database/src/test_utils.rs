//! Test utilities for unit testing reconcilers
//!
//! Helpers for building Database objects and a Reconciler wired to the
//! in-memory store.

#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use crds::*;
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use resource_client::{MockEventRecorder, MockResourceClient};

/// Namespace used by every test object
#[cfg(test)]
pub const TEST_NAMESPACE: &str = "default";

/// Helper to create a Database with a minimal spec
#[cfg(test)]
pub fn database(name: &str) -> Database {
    Database {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: serde_json::from_value(serde_json::json!({
            "image": "img:v1",
            "storage": { "size": "1Gi" }
        }))
        .unwrap(),
        status: None,
    }
}

/// Helper to create a Database with `auth` and an ingress for `host`
#[cfg(test)]
pub fn database_with_auth_and_ingress(name: &str, host: &str) -> Database {
    let mut db = database(name);
    db.spec.auth = true;
    db.spec.ingress = Some(DatabaseIngressSpec {
        ingress_class_name: Some("nginx".to_string()),
        host: host.to_string(),
        tls: vec![],
    });
    db
}

/// Mock store, event recorder and a Reconciler sharing them
#[cfg(test)]
pub struct TestHarness {
    pub client: MockResourceClient,
    pub recorder: MockEventRecorder,
    pub reconciler: Reconciler,
}

#[cfg(test)]
impl TestHarness {
    pub fn new() -> Self {
        let client = MockResourceClient::new();
        let recorder = MockEventRecorder::new();
        let reconciler = Reconciler::new(client.clone(), recorder.clone());
        Self {
            client,
            recorder,
            reconciler,
        }
    }

    /// Store `database` and return the stored copy (with uid and version)
    pub fn add(&self, database: Database) -> Database {
        self.client.add_database(database)
    }

    /// Stored copy of the Database named `name`
    pub fn current(&self, name: &str) -> Database {
        self.client.database(TEST_NAMESPACE, name).unwrap()
    }

    /// Replace the stored spec of `name`, as a user edit would
    pub fn edit(&self, name: &str, edit: impl FnOnce(&mut DatabaseSpec)) {
        let mut db = self.current(name);
        edit(&mut db.spec);
        self.client.add_database(db);
    }
}
