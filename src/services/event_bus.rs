//! Broadcast bus for live dashboard updates.

use serde::Serialize;
use tokio::sync::broadcast;

/// Event published when a dashboard entity changes.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    /// Event type, e.g. "post.scheduled", "account.updated"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Id of the affected entity
    pub entity_id: String,
    /// Email of the user who triggered the change
    pub actor: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl DomainEvent {
    /// Create a domain event timestamped to now.
    pub fn now(
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            actor,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Fan-out bus backed by `tokio::sync::broadcast`.
///
/// A subscriber that falls behind receives `RecvError::Lagged` and is
/// expected to refetch the lists it renders.
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. With no subscribers the event is dropped silently.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}
