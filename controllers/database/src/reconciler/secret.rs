//! Auth secret reconciler
//!
//! Keeps `<name>-auth-key` present exactly while `spec.auth` is true. Keys
//! are generated once and never rotated.

use super::Reconciler;
use crate::error::ControllerError;
use crate::keys::generate_auth_keypair;
use crate::names::{self, NodeRole, PRIVATE_KEY_FIELD, PUBLIC_KEY_FIELD};
use crate::owner::{child_metadata, database_key};
use crds::Database;
use k8s_openapi::api::core::v1::Secret;
use resource_client::EventType;
use std::collections::BTreeMap;
use tracing::info;

impl Reconciler {
    pub(crate) async fn reconcile_auth_secret(
        &self,
        database: &Database,
    ) -> Result<Option<Secret>, ControllerError> {
        let (namespace, name) = database_key(database)?;
        let secret_name = names::auth_secret_name(&name);

        let existing = match self.client.get_secret(&namespace, &secret_name).await {
            Ok(secret) => Some(secret),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if !database.spec.auth {
            if existing.is_some() {
                info!("Auth disabled for Database {}/{}, deleting Secret {}", namespace, name, secret_name);
                match self.client.delete_secret(&namespace, &secret_name).await {
                    Ok(()) => {
                        self.publish_deleted(database, "Secret", &secret_name).await;
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok(None);
        }

        if let Some(secret) = existing {
            return Ok(Some(secret));
        }

        let keypair = generate_auth_keypair()?;
        let secret = Secret {
            metadata: child_metadata(database, secret_name.clone(), names::labels(&name, NodeRole::Primary))?,
            string_data: Some(BTreeMap::from([
                (PUBLIC_KEY_FIELD.to_string(), keypair.public_key),
                (PRIVATE_KEY_FIELD.to_string(), keypair.private_key),
            ])),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };

        info!("Creating Secret {}/{}", namespace, secret_name);
        let created = self.client.create_secret(&secret).await?;
        self.publish_created(database, "Secret", &secret_name).await;
        Ok(Some(created))
    }

    /// Record a `SuccessfulCreate` event for a child.
    pub(crate) async fn publish_created(&self, database: &Database, kind: &str, child: &str) {
        let namespace = database.metadata.namespace.as_deref().unwrap_or_default();
        self.recorder
            .publish(
                database,
                EventType::Normal,
                "SuccessfulCreate",
                "Create",
                format!("create {kind} {child} is being created in the Namespace {namespace} success"),
            )
            .await;
    }

    /// Record a `SuccessfulDelete` event for a child removed by a spec change.
    pub(crate) async fn publish_deleted(&self, database: &Database, kind: &str, child: &str) {
        let namespace = database.metadata.namespace.as_deref().unwrap_or_default();
        self.recorder
            .publish(
                database,
                EventType::Normal,
                "SuccessfulDelete",
                "Delete",
                format!("delete {kind} {child} in the Namespace {namespace} success"),
            )
            .await;
    }
}
