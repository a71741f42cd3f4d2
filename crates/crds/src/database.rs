//! Database CRD
//!
//! Declares a libsql (sqld) deployment: the image to run, whether JWT auth is
//! enabled, storage, compute resources and an optional ingress route.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Affinity, EnvVar, LocalObjectReference, ResourceRequirements, Toleration,
};
use k8s_openapi::api::networking::v1::IngressTLS;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group served by the operator.
pub const DATABASE_GROUP: &str = "libsql.ahti.io";

/// API version served by the operator.
pub const DATABASE_VERSION: &str = "v1";

/// Kind of the custom resource.
pub const DATABASE_KIND: &str = "Database";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "libsql.ahti.io",
    version = "v1",
    kind = "Database",
    namespaced,
    status = "DatabaseStatus",
    shortname = "ldb",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Auth","type":"boolean","jsonPath":".spec.auth"}"#,
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// sqld container image
    pub image: String,

    /// Pull policy for the sqld container
    #[serde(default)]
    pub image_pull_policy: ImagePullPolicy,

    /// Enable JWT authentication (generates an Ed25519 key secret)
    #[serde(default)]
    pub auth: bool,

    /// Persistent storage for the primary
    pub storage: DatabaseStorage,

    /// Compute requests/limits for the sqld container
    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Expose the database through an Ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<DatabaseIngressSpec>,

    /// Extra environment for the sqld container.
    ///
    /// `SQLD_NODE`, `SQLD_AUTH_JWT_KEY` and `SQLD_PRIMARY_URL` are owned by
    /// the operator and are dropped from this list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Number of read replicas (0 or unset disables the replica StatefulSet)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

impl DatabaseSpec {
    /// Requested read replicas, clamped at zero.
    #[must_use]
    pub fn replica_count(&self) -> i32 {
        self.replicas.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStorage {
    /// Size of the volume claim (e.g. "1Gi")
    pub size: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseIngressSpec {
    /// IngressClass to use (cluster default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    /// Host routed to the database service
    #[serde(default)]
    pub host: String,

    /// TLS entries copied verbatim onto the Ingress
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTLS>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Container image pull policy
pub enum ImagePullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl ImagePullPolicy {
    /// Value as understood by the pod spec.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
            ImagePullPolicy::Never => "Never",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    /// Observations of the Database's current state.
    ///
    /// At most one entry per condition type.
    #[serde(default)]
    pub conditions: Vec<DatabaseCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCondition {
    #[serde(rename = "type")]
    pub type_: ConditionType,

    pub status: ConditionStatus,

    /// CamelCase reason code
    pub reason: String,

    /// Human readable details
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time `status` changed
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
/// Condition types reported on a Database
pub enum ConditionType {
    /// Child resources are converged
    Available,
    /// The Database is being finalized
    Degraded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../../config/samples/libsql_v1_database.yaml");

    #[test]
    fn test_sample_manifest_deserializes() {
        let db: Database = serde_yaml::from_str(SAMPLE).expect("sample should parse");
        assert_eq!(db.spec.image, "ghcr.io/tursodatabase/libsql-server:latest");
        assert!(db.spec.auth);
        assert_eq!(db.spec.storage.size, Quantity("1Gi".to_string()));
        assert_eq!(db.spec.image_pull_policy, ImagePullPolicy::IfNotPresent);
        let ingress = db.spec.ingress.expect("sample has ingress");
        assert_eq!(ingress.host, "a.example.com");
        assert_eq!(ingress.ingress_class_name.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_minimal_spec_defaults() {
        let db: Database = serde_json::from_value(serde_json::json!({
            "apiVersion": "libsql.ahti.io/v1",
            "kind": "Database",
            "metadata": { "name": "db", "namespace": "default" },
            "spec": { "image": "img:v1", "storage": { "size": "1Gi" } }
        }))
        .expect("minimal spec should parse");
        assert!(!db.spec.auth);
        assert!(db.spec.ingress.is_none());
        assert!(db.spec.env.is_empty());
        assert_eq!(db.spec.replica_count(), 0);
        assert!(db.status.is_none());
    }

    #[test]
    fn test_condition_serializes_type_field() {
        let condition = DatabaseCondition {
            type_: ConditionType::Available,
            status: ConditionStatus::Unknown,
            reason: "Reconciling".to_string(),
            message: "Starting reconciliation".to_string(),
            observed_generation: None,
            last_transition_time: Utc::now(),
        };
        let value = serde_json::to_value(&condition).expect("condition should serialize");
        assert_eq!(value["type"], "Available");
        assert_eq!(value["status"], "Unknown");
        assert!(value.get("lastTransitionTime").is_some());
    }

    #[test]
    fn test_negative_replicas_clamped() {
        let mut spec: DatabaseSpec = serde_json::from_value(serde_json::json!({
            "image": "img:v1",
            "storage": { "size": "1Gi" },
            "replicas": -2
        }))
        .expect("spec should parse");
        assert_eq!(spec.replica_count(), 0);
        spec.replicas = Some(3);
        assert_eq!(spec.replica_count(), 3);
    }
}
