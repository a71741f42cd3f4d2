//! Store errors

use thiserror::Error;

/// Errors returned by a [`crate::ResourceClient`].
///
/// Kubernetes API failures are classified by status code so callers can
/// branch on the expected cases (missing object, stale resourceVersion)
/// without inspecting raw responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Object does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the resourceVersion was stale (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Create rejected because the object already exists (HTTP 409, reason AlreadyExists)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Object is missing metadata required for the call (name/namespace)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// JSON serialization error while building a request
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other API or transport failure
    #[error("Kubernetes API error: {0}")]
    Api(String),
}

impl StoreError {
    /// True for a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// True when a concurrent writer got there first: stale version or a
    /// create racing another create.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::AlreadyExists(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(api_err.message),
            kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
                StoreError::AlreadyExists(api_err.message)
            }
            kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(api_err.message),
            other => StoreError::Api(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
