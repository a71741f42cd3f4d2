//! Canonical names and labels for a Database's child resources.

use std::collections::BTreeMap;

/// Finalizer that guards PVC and secret cleanup.
pub const FINALIZER: &str = "libsql.ahti.io/finalizer";

/// Label carrying the owning Database's name.
pub const MANAGED_BY_LABEL: &str = "ahti.database.io/managed-by";

/// Label carrying the node role.
pub const NODE_LABEL: &str = "node";

pub const CONTAINER_NAME: &str = "libsql-server";
pub const HTTP_PORT: i32 = 8080;
pub const GRPC_PORT: i32 = 5001;
pub const HEALTH_PATH: &str = "/health";
pub const DATA_PATH: &str = "/var/lib/sqld";

pub const PUBLIC_KEY_FIELD: &str = "PUBLIC_KEY";
pub const PRIVATE_KEY_FIELD: &str = "PRIVATE_KEY";

// Environment owned by the controller
pub const ENV_NODE: &str = "SQLD_NODE";
pub const ENV_AUTH_JWT_KEY: &str = "SQLD_AUTH_JWT_KEY";
pub const ENV_PRIMARY_URL: &str = "SQLD_PRIMARY_URL";
pub const RESERVED_ENV: [&str; 3] = [ENV_NODE, ENV_AUTH_JWT_KEY, ENV_PRIMARY_URL];

/// Role of a sqld pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Primary,
    Replica,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Replica => "replica",
        }
    }
}

pub fn auth_secret_name(database: &str) -> String {
    format!("{database}-auth-key")
}

pub fn primary_name(database: &str) -> String {
    database.to_string()
}

pub fn replica_name(database: &str) -> String {
    format!("{database}-replica")
}

pub fn headless_service_name(database: &str) -> String {
    format!("{database}-svc-headless")
}

pub fn service_name(database: &str) -> String {
    format!("{database}-svc")
}

pub fn ingress_name(database: &str) -> String {
    format!("{database}-ingress")
}

pub fn volume_claim_name(database: &str) -> String {
    format!("{database}-pvc")
}

/// In-cluster gRPC address of the primary's first pod, used by replicas.
pub fn primary_url(database: &str, namespace: &str) -> String {
    format!(
        "http://{}-0.{}.{}.svc.cluster.local:{}",
        primary_name(database),
        headless_service_name(database),
        namespace,
        GRPC_PORT
    )
}

/// Labels (and selector) for children of `database` in `role`.
pub fn labels(database: &str, role: NodeRole) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), database.to_string()),
        (NODE_LABEL.to_string(), role.as_str().to_string()),
    ])
}

/// Selector matching every PVC created for `database`.
pub fn volume_claim_selector(database: &str) -> String {
    format!("{MANAGED_BY_LABEL}={database}")
}
