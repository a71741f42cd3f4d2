//! Controller-specific error types.
//!
//! Store failures arrive already classified by `resource-client`; this module
//! adds the failures that only the controller can produce.

use resource_client::StoreError;
use thiserror::Error;

/// Errors that can occur in the Database controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Auth keypair could not be generated
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Database object is missing data the controller needs
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconciliation exceeded its deadline
    #[error("Reconciliation timed out after {0}s")]
    Timeout(u64),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics/probe server failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ControllerError {
    /// True when a concurrent writer advanced the object first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Store(e) if e.is_conflict())
    }
}
