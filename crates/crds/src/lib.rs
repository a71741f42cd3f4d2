//! libsql operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Database controller.

pub mod database;

pub use database::*;
