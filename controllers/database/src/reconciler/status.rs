//! Status conditions on a Database.
//!
//! At most one condition per type is kept. Writing a condition that matches
//! the stored one is a no-op, which keeps status writes from re-triggering
//! the watch on the Database forever.

use super::Reconciler;
use crate::error::ControllerError;
use chrono::Utc;
use crds::{ConditionStatus, ConditionType, Database, DatabaseCondition, DatabaseStatus};
use kube::ResourceExt;
use tracing::debug;

/// Condition of `type_` on `database`, if present.
pub fn find_condition(database: &Database, type_: ConditionType) -> Option<&DatabaseCondition> {
    database.status.as_ref()?.conditions.iter().find(|c| c.type_ == type_)
}

/// Merge `new` into `conditions`.
///
/// `lastTransitionTime` moves only when `status` changes. Returns true when
/// anything observable changed.
pub fn set_status_condition(conditions: &mut Vec<DatabaseCondition>, new: DatabaseCondition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) else {
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = new.last_transition_time;
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}

impl Reconciler {
    /// Set a condition on `database` and persist the status if it changed.
    ///
    /// Returns the stored Database after the write, or `database` untouched
    /// when no write was needed.
    pub(crate) async fn update_condition(
        &self,
        mut database: Database,
        type_: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: String,
    ) -> Result<Database, ControllerError> {
        let condition = DatabaseCondition {
            type_,
            status,
            reason: reason.to_string(),
            message,
            observed_generation: database.metadata.generation,
            last_transition_time: Utc::now(),
        };

        let current = database.status.get_or_insert_with(DatabaseStatus::default);
        if !set_status_condition(&mut current.conditions, condition) {
            debug!(
                "Condition {:?} unchanged on Database {}/{}, skipping status write",
                type_,
                database.namespace().unwrap_or_default(),
                database.name_any()
            );
            return Ok(database);
        }

        Ok(self.client.update_database_status(&database).await?)
    }
}
