//! Ingress reconciler

use super::{found, Reconciler};
use crate::error::ControllerError;
use crate::names::{self, NodeRole, HTTP_PORT};
use crate::owner::{child_metadata, database_key};
use crds::{Database, DatabaseIngressSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use tracing::info;

/// Desired Ingress routing every path on the configured host to `<name>-svc`.
pub fn build_ingress(database: &Database, config: &DatabaseIngressSpec) -> Result<Ingress, ControllerError> {
    let (_, name) = database_key(database)?;

    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: names::service_name(&name),
            port: Some(ServiceBackendPort {
                number: Some(HTTP_PORT),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    Ok(Ingress {
        metadata: child_metadata(database, names::ingress_name(&name), names::labels(&name, NodeRole::Primary))?,
        spec: Some(IngressSpec {
            ingress_class_name: config.ingress_class_name.clone(),
            rules: Some(vec![IngressRule {
                host: Some(config.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            tls: (!config.tls.is_empty()).then(|| config.tls.clone()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

impl Reconciler {
    /// Upsert the Ingress when configured, delete it otherwise.
    pub(crate) async fn reconcile_ingress(&self, database: &Database) -> Result<Option<Ingress>, ControllerError> {
        let (namespace, name) = database_key(database)?;
        let ingress_name = names::ingress_name(&name);
        let existing = found(self.client.get_ingress(&namespace, &ingress_name).await)?;

        let Some(config) = database.spec.ingress.as_ref() else {
            if existing.is_some() {
                info!("Ingress removed from Database {}/{}, deleting {}", namespace, name, ingress_name);
                match self.client.delete_ingress(&namespace, &ingress_name).await {
                    Ok(()) => self.publish_deleted(database, "Ingress", &ingress_name).await,
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok(None);
        };

        let mut desired = build_ingress(database, config)?;
        let current = match existing {
            Some(ingress) => ingress,
            None => {
                info!("Creating Ingress {}/{}", namespace, ingress_name);
                let created = self.client.create_ingress(&desired).await?;
                self.publish_created(database, "Ingress", &ingress_name).await;
                created
            }
        };

        desired.metadata.resource_version = current.metadata.resource_version;
        Ok(Some(self.client.replace_ingress(&desired).await?))
    }
}
