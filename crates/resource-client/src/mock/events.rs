//! In-memory EventRecorder

use crate::client_trait::{EventRecorder, EventType};
use crds::Database;
use std::sync::{Arc, Mutex};

/// An event captured by [`MockEventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event_type: EventType,
    pub reason: String,
    pub action: String,
    pub note: String,
    /// `namespace/name` of the Database the event is attached to
    pub object: String,
}

/// Mock EventRecorder for testing
#[derive(Clone, Debug, Default)]
pub struct MockEventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MockEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, in order
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events with the given reason
    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

#[async_trait::async_trait]
impl EventRecorder for MockEventRecorder {
    async fn publish(
        &self,
        database: &Database,
        event_type: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        let object = format!(
            "{}/{}",
            database.metadata.namespace.as_deref().unwrap_or_default(),
            database.metadata.name.as_deref().unwrap_or_default()
        );
        self.events.lock().unwrap().push(RecordedEvent {
            event_type,
            reason: reason.to_string(),
            action: action.to_string(),
            note,
            object,
        });
    }
}
