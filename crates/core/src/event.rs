//! Pipeline event system: decoupled observation of controller transitions.
//!
//! The controller publishes an event whenever it starts, finishes, retries,
//! or escalates an attempt. UIs and log shippers subscribe without the
//! controller knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::outcome::{Classification, Completeness};
use crate::provider::FinishReason;

/// All pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new attempt was sent to the provider
    AttemptStarted {
        task_id: String,
        attempt: u32,
        tier: String,
        timestamp: DateTime<Utc>,
    },

    /// An attempt's stream ended and was judged
    AttemptFinished {
        task_id: String,
        attempt: u32,
        tier: String,
        finish_reason: FinishReason,
        classification: Classification,
        completeness: Completeness,
        timestamp: DateTime<Utc>,
    },

    /// The next attempt moves to a more capable tier
    Escalated {
        task_id: String,
        from_tier: String,
        to_tier: String,
        timestamp: DateTime<Utc>,
    },

    /// A transient provider failure is being retried on the same tier
    TransientRetry {
        task_id: String,
        tier: String,
        retry: u32,
        delay_ms: u64,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The task produced an artifact
    Succeeded {
        task_id: String,
        tier: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// The task ended without an artifact
    Failed {
        task_id: String,
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for pipeline events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::Escalated {
            task_id: "t1".into(),
            from_tier: "fast".into(),
            to_tier: "capable".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            PipelineEvent::Escalated { from_tier, to_tier, .. } => {
                assert_eq!(from_tier, "fast");
                assert_eq!(to_tier, "capable");
            }
            _ => panic!("Expected Escalated event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(PipelineEvent::Failed {
            task_id: "t".into(),
            kind: "cancelled".into(),
            message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = PipelineEvent::Succeeded {
            task_id: "t".into(),
            tier: "fast".into(),
            attempts: 1,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"succeeded""#));
    }
}
