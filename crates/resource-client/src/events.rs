//! Kubernetes-backed EventRecorder

use crate::client_trait::{EventRecorder, EventType};
use crds::Database;
use kube::runtime::events::{Event, EventType as KubeEventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

/// Publishes `events.k8s.io` Events attached to a Database.
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    /// Create a recorder reporting as `controller_name`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn publish(
        &self,
        database: &Database,
        event_type: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        let type_ = match event_type {
            EventType::Normal => KubeEventType::Normal,
            EventType::Warning => KubeEventType::Warning,
        };
        let reference = database.object_ref(&());
        if let Err(e) = self
            .recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.to_string(),
                    note: Some(note),
                    action: action.to_string(),
                    secondary: None,
                },
                &reference,
            )
            .await
        {
            warn!("Failed to publish {} event for Database {:?}: {}", reason, reference.name, e);
        }
    }
}
