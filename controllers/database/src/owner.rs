//! Owner references between a Database and its children.

use crate::error::ControllerError;
use crds::{Database, DATABASE_GROUP, DATABASE_KIND, DATABASE_VERSION};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube_runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};

/// Namespace and name of a Database, failing when either is missing.
pub fn database_key(database: &Database) -> Result<(String, String), ControllerError> {
    let name = database
        .metadata
        .name
        .clone()
        .ok_or_else(|| ControllerError::InvalidResource("Database has no name".to_string()))?;
    let namespace = database
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| ControllerError::InvalidResource(format!("Database {name} has no namespace")))?;
    Ok((namespace, name))
}

/// Controller owner reference pointing at `database`.
///
/// Requires the uid, which the store assigns on create.
pub fn owner_reference(database: &Database) -> Result<OwnerReference, ControllerError> {
    let mut reference = database.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "Database {} has no uid",
            database.name_any()
        ))
    })?;
    reference.block_owner_deletion = Some(true);
    Ok(reference)
}

/// Metadata for a child of `database` named `name`.
pub fn child_metadata(
    database: &Database,
    name: String,
    labels: std::collections::BTreeMap<String, String>,
) -> Result<ObjectMeta, ControllerError> {
    let (namespace, _) = database_key(database)?;
    Ok(ObjectMeta {
        name: Some(name),
        namespace: Some(namespace),
        labels: Some(labels),
        owner_references: Some(vec![owner_reference(database)?]),
        ..Default::default()
    })
}

/// The Database that owns `child`, if any.
///
/// Matches owner references by group, version and kind; the owner lives in
/// the child's namespace.
pub fn owner_of<K: Resource>(child: &K) -> Option<ObjectRef<Database>> {
    let api_version = format!("{DATABASE_GROUP}/{DATABASE_VERSION}");
    let namespace = child.meta().namespace.as_deref()?;
    child
        .meta()
        .owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.api_version == api_version && owner.kind == DATABASE_KIND)
        .map(|owner| ObjectRef::new(&owner.name).within(namespace))
}
