//! Kubernetes store client for the libsql Database controller
//!
//! Wraps the handful of Kubernetes API calls the Database reconciler needs
//! behind the [`ResourceClient`] and [`EventRecorder`] traits, so the
//! reconciler can run against the real API server or an in-memory store.
//!
//! # Example
//!
//! ```no_run
//! use resource_client::{KubeResourceClient, ResourceClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeResourceClient::new(kube::Client::try_default().await?);
//! let database = client.get_database("default", "database-sample").await?;
//! println!("{:?}", database.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **test-util**: exposes `MockResourceClient` and `MockEventRecorder`

pub mod client;
#[path = "trait.rs"]
pub mod client_trait;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeResourceClient;
pub use client_trait::{EventRecorder, EventType, ResourceClient};
pub use error::StoreError;
pub use events::KubeEventRecorder;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockEventRecorder, MockResourceClient, RecordedEvent};
