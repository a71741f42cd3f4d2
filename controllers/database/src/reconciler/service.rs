//! Service reconciler
//!
//! Two Services select the primary pod: `<name>-svc-headless` gives the
//! StatefulSet stable per-pod DNS, `<name>-svc` is the client-facing address.

use super::{found, Reconciler};
use crate::error::ControllerError;
use crate::names::{self, NodeRole, GRPC_PORT, HTTP_PORT};
use crate::owner::{child_metadata, database_key};
use crds::Database;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::info;

fn service_ports() -> Vec<ServicePort> {
    [("primary-http", HTTP_PORT), ("primary-grpc", GRPC_PORT)]
        .into_iter()
        .map(|(name, port)| ServicePort {
            name: Some(name.to_string()),
            port,
            target_port: Some(IntOrString::Int(port)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        })
        .collect()
}

/// Desired Service; `headless` leaves it without a cluster IP.
pub fn build_service(database: &Database, headless: bool) -> Result<Service, ControllerError> {
    let (_, name) = database_key(database)?;
    let labels = names::labels(&name, NodeRole::Primary);
    let service_name = if headless {
        names::headless_service_name(&name)
    } else {
        names::service_name(&name)
    };

    Ok(Service {
        metadata: child_metadata(database, service_name, labels.clone())?,
        spec: Some(ServiceSpec {
            cluster_ip: headless.then(|| "None".to_string()),
            ports: Some(service_ports()),
            selector: Some(labels),
            ..Default::default()
        }),
        ..Default::default()
    })
}

impl Reconciler {
    /// Upsert the headless and routable Services, returned in that order.
    pub(crate) async fn reconcile_services(&self, database: &Database) -> Result<(Service, Service), ControllerError> {
        let headless = self.upsert_service(database, build_service(database, true)?).await?;
        let routable = self.upsert_service(database, build_service(database, false)?).await?;
        Ok((headless, routable))
    }

    async fn upsert_service(&self, database: &Database, mut desired: Service) -> Result<Service, ControllerError> {
        let (namespace, _) = database_key(database)?;
        let name = desired.metadata.name.clone().unwrap_or_default();

        let current = match found(self.client.get_service(&namespace, &name).await)? {
            Some(existing) => existing,
            None => {
                info!("Creating Service {}/{}", namespace, name);
                let created = self.client.create_service(&desired).await?;
                self.publish_created(database, "Service", &name).await;
                created
            }
        };

        // clusterIP is immutable once allocated
        if let (Some(spec), Some(current_spec)) = (desired.spec.as_mut(), current.spec.as_ref()) {
            if spec.cluster_ip.is_none() {
                spec.cluster_ip.clone_from(&current_spec.cluster_ip);
                spec.cluster_ips.clone_from(&current_spec.cluster_ips);
            }
        }
        desired.metadata.resource_version = current.metadata.resource_version;
        Ok(self.client.replace_service(&desired).await?)
    }
}
