//! Finalization of a Database marked for deletion.
//!
//! Owner references cascade every child except the volume claims created
//! from the StatefulSet templates, so those are deleted here along with the
//! auth secret before the finalizer is released.

use super::Reconciler;
use crate::error::ControllerError;
use crate::names::{self, FINALIZER};
use crate::owner::database_key;
use crds::{ConditionStatus, ConditionType, Database};
use resource_client::EventType;
use tracing::{error, info, warn};

/// True when `database` carries the controller's finalizer.
pub fn has_finalizer(database: &Database) -> bool {
    database
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|entry| entry == FINALIZER))
}

/// Add the finalizer; returns false when it was already present.
pub fn add_finalizer(database: &mut Database) -> bool {
    if has_finalizer(database) {
        return false;
    }
    database
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    true
}

/// Remove the finalizer; returns false when it was not present.
pub fn remove_finalizer(database: &mut Database) -> bool {
    let Some(finalizers) = database.metadata.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|entry| entry != FINALIZER);
    finalizers.len() != before
}

impl Reconciler {
    /// Run pre-delete cleanup and return the Database after the final
    /// status write.
    pub(crate) async fn finalize(&self, database: Database) -> Result<Database, ControllerError> {
        let (namespace, name) = database_key(&database)?;
        info!("Finalizing Database {}/{}", namespace, name);

        self.recorder
            .publish(
                &database,
                EventType::Warning,
                "Deleting",
                "Finalize",
                format!("Custom Resource {name} is being deleted from the namespace {namespace}"),
            )
            .await;

        let database = self
            .update_condition(
                database,
                ConditionType::Degraded,
                ConditionStatus::Unknown,
                "Finalizing",
                format!("Performing finalizer operations for the custom resource: {name}"),
            )
            .await?;

        let selector = names::volume_claim_selector(&name);
        // Claims have no owner reference; a failed listing keeps the finalizer.
        let claims = self
            .client
            .list_persistent_volume_claims(&namespace, &selector)
            .await
            .inspect_err(|e| {
                error!("Failed to list PersistentVolumeClaims for Database {}/{}: {}", namespace, name, e);
            })?;
        for claim in claims {
            let Some(claim_name) = claim.metadata.name else {
                continue;
            };
            match self.client.delete_persistent_volume_claim(&namespace, &claim_name).await {
                Ok(()) => info!("Deleted PersistentVolumeClaim {}/{}", namespace, claim_name),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(
                    "Failed to delete PersistentVolumeClaim {}/{}: {}",
                    namespace, claim_name, e
                ),
            }
        }

        let secret_name = names::auth_secret_name(&name);
        match self.client.delete_secret(&namespace, &secret_name).await {
            Ok(()) => info!("Deleted Secret {}/{}", namespace, secret_name),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("Failed to delete Secret {}/{}: {}", namespace, secret_name, e),
        }

        self.update_condition(
            database,
            ConditionType::Degraded,
            ConditionStatus::True,
            "Finalizing",
            format!("Finalizer operations for custom resource {name} name were successfully accomplished"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::database;

    #[test]
    fn test_add_and_remove_finalizer() {
        let mut db = database("db");
        assert!(!has_finalizer(&db));
        assert!(add_finalizer(&mut db));
        assert!(!add_finalizer(&mut db));
        assert_eq!(db.metadata.finalizers.as_ref().map(Vec::len), Some(1));
        assert!(remove_finalizer(&mut db));
        assert!(!remove_finalizer(&mut db));
        assert!(!has_finalizer(&db));
    }

    #[test]
    fn test_remove_keeps_foreign_finalizers() {
        let mut db = database("db");
        db.metadata.finalizers = Some(vec!["other.io/keep".to_string(), FINALIZER.to_string()]);
        assert!(remove_finalizer(&mut db));
        assert_eq!(db.metadata.finalizers, Some(vec!["other.io/keep".to_string()]));
    }
}
