//! Notification intents for the medlem services
//!
//! Provides the shared `RegistrationEvent` enum and the `EventBus` used to
//! hand intents to the notification forwarder. Emission is decoupled from
//! the admission transaction: intents are broadcast only after commit and a
//! failed or unobserved broadcast never affects the committed outcome.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Registration lifecycle events
///
/// Broadcast via EventBus after the owning transaction commits. Serializable
/// so the forwarder can post them to the notification service as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RegistrationEvent {
    /// User was granted a seat
    RegistrationConfirmed {
        user_id: Uuid,
        event_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User entered the waitlist on arrival
    Waitlisted {
        user_id: Uuid,
        event_id: Uuid,
        /// 1-based rank at the time of commit
        position: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A registered user was displaced by an arriving prioritized user
    SwappedToWaitlist {
        user_id: Uuid,
        event_id: Uuid,
        /// 1-based rank after displacement
        position: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A waitlisted user was granted a seat (cancellation or admin move)
    PromotedFromWaitlist {
        user_id: Uuid,
        event_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User cancelled their registration
    RegistrationCancelled {
        user_id: Uuid,
        event_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RegistrationEvent {
    /// The user the intent is addressed to
    pub fn user_id(&self) -> Uuid {
        match self {
            RegistrationEvent::RegistrationConfirmed { user_id, .. }
            | RegistrationEvent::Waitlisted { user_id, .. }
            | RegistrationEvent::SwappedToWaitlist { user_id, .. }
            | RegistrationEvent::PromotedFromWaitlist { user_id, .. }
            | RegistrationEvent::RegistrationCancelled { user_id, .. } => *user_id,
        }
    }
}

/// Broadcast bus for registration events
///
/// Uses tokio::broadcast internally: multiple subscribers, bounded buffer,
/// slow subscribers drop old events rather than blocking emitters.
pub struct EventBus {
    tx: broadcast::Sender<RegistrationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Notification dispatch is best-effort; an unobserved intent is not an
    /// error for the emitter.
    pub fn emit_lossy(&self, event: RegistrationEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        bus.emit_lossy(RegistrationEvent::RegistrationConfirmed {
            user_id,
            event_id,
            timestamp: chrono::Utc::now(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.user_id(), user_id);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(RegistrationEvent::RegistrationCancelled {
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        });
    }

    #[test]
    fn test_events_serialize_with_kind_tag() {
        let event = RegistrationEvent::SwappedToWaitlist {
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            position: 1,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "swapped-to-waitlist");
        assert_eq!(json["position"], 1);
    }
}
