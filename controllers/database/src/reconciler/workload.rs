//! StatefulSet reconciler
//!
//! The primary always runs as a single-pod StatefulSet named after the
//! Database. When `spec.replicas` is positive a second StatefulSet runs read
//! replicas that stream from the primary's first pod.

use super::{found, Reconciler};
use crate::error::ControllerError;
use crate::names::{self, NodeRole, DATA_PATH, GRPC_PORT, HEALTH_PATH, HTTP_PORT, RESERVED_ENV};
use crate::owner::{child_metadata, database_key};
use crds::Database;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Probe, SecretKeySelector,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::info;

/// Environment for a sqld container in `role`.
///
/// Controller-owned variables come first; user entries with a reserved name
/// are dropped.
pub fn container_env(database: &Database, name: &str, namespace: &str, role: NodeRole) -> Vec<EnvVar> {
    let mut env = vec![EnvVar {
        name: names::ENV_NODE.to_string(),
        value: Some(role.as_str().to_string()),
        ..Default::default()
    }];

    if database.spec.auth {
        env.push(EnvVar {
            name: names::ENV_AUTH_JWT_KEY.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: names::auth_secret_name(name),
                    key: names::PUBLIC_KEY_FIELD.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    if role == NodeRole::Replica {
        env.push(EnvVar {
            name: names::ENV_PRIMARY_URL.to_string(),
            value: Some(names::primary_url(name, namespace)),
            ..Default::default()
        });
    }

    env.extend(
        database
            .spec
            .env
            .iter()
            .filter(|var| !RESERVED_ENV.contains(&var.name.as_str()))
            .cloned(),
    );
    env
}

fn health_probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(HEALTH_PATH.to_string()),
            port: IntOrString::Int(HTTP_PORT),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_ports(role: NodeRole) -> Vec<ContainerPort> {
    match role {
        NodeRole::Primary => vec![
            ContainerPort {
                name: Some("primary-http".to_string()),
                container_port: HTTP_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                name: Some("primary-grpc".to_string()),
                container_port: GRPC_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ],
        NodeRole::Replica => vec![ContainerPort {
            name: Some("replica-http".to_string()),
            container_port: HTTP_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }],
    }
}

/// Desired StatefulSet for `role`.
pub fn build_stateful_set(database: &Database, role: NodeRole) -> Result<StatefulSet, ControllerError> {
    let (namespace, name) = database_key(database)?;
    let spec = &database.spec;
    let labels = names::labels(&name, role);
    let claim_name = names::volume_claim_name(&name);
    let (stateful_set_name, replicas) = match role {
        NodeRole::Primary => (names::primary_name(&name), 1),
        NodeRole::Replica => (names::replica_name(&name), spec.replica_count()),
    };

    let container = Container {
        name: names::CONTAINER_NAME.to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.as_str().to_string()),
        env: Some(container_env(database, &name, &namespace, role)),
        ports: Some(container_ports(role)),
        resources: Some(spec.resources.clone()),
        liveness_probe: Some(health_probe()),
        readiness_probe: Some(health_probe()),
        volume_mounts: Some(vec![VolumeMount {
            name: claim_name.clone(),
            mount_path: DATA_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        containers: vec![container],
        node_selector: spec.node_selector.clone(),
        service_account_name: spec.service_account_name.clone(),
        automount_service_account_token: spec.automount_service_account_token,
        image_pull_secrets: (!spec.image_pull_secrets.is_empty()).then(|| spec.image_pull_secrets.clone()),
        affinity: spec.affinity.clone(),
        scheduler_name: spec.scheduler_name.clone(),
        tolerations: (!spec.tolerations.is_empty()).then(|| spec.tolerations.clone()),
        ..Default::default()
    };

    // Not owner-referenced: claims outlive the StatefulSet and are removed by
    // the finalizer.
    let claim_template = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(claim_name),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([("storage".to_string(), spec.storage.size.clone())])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(StatefulSet {
        metadata: child_metadata(database, stateful_set_name, labels.clone())?,
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            service_name: Some(names::headless_service_name(&name)),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            volume_claim_templates: Some(vec![claim_template]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

impl Reconciler {
    /// Upsert the primary StatefulSet, then the replica StatefulSet (or
    /// delete it when replicas are not requested).
    pub(crate) async fn reconcile_workloads(&self, database: &Database) -> Result<StatefulSet, ControllerError> {
        let primary = self.upsert_stateful_set(database, NodeRole::Primary).await?;

        if database.spec.replica_count() > 0 {
            self.upsert_stateful_set(database, NodeRole::Replica).await?;
        } else {
            let (namespace, name) = database_key(database)?;
            let replica_name = names::replica_name(&name);
            if found(self.client.get_stateful_set(&namespace, &replica_name).await)?.is_some() {
                info!("Replicas disabled for Database {}/{}, deleting StatefulSet {}", namespace, name, replica_name);
                match self.client.delete_stateful_set(&namespace, &replica_name).await {
                    Ok(()) => self.publish_deleted(database, "StatefulSet", &replica_name).await,
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(primary)
    }

    async fn upsert_stateful_set(&self, database: &Database, role: NodeRole) -> Result<StatefulSet, ControllerError> {
        let mut desired = build_stateful_set(database, role)?;
        let namespace = desired.metadata.namespace.clone().unwrap_or_default();
        let name = desired.metadata.name.clone().unwrap_or_default();

        let current = match found(self.client.get_stateful_set(&namespace, &name).await)? {
            Some(existing) => existing,
            None => {
                info!("Creating StatefulSet {}/{}", namespace, name);
                let created = self.client.create_stateful_set(&desired).await?;
                self.publish_created(database, "StatefulSet", &name).await;
                created
            }
        };

        desired.metadata.resource_version = current.metadata.resource_version;
        Ok(self.client.replace_stateful_set(&desired).await?)
    }
}
