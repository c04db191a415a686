//! Event fan-out: durable writes publish domain events to tenant-scoped
//! topics, best-effort. Publishing never extends or fails the request
//! that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub mod events;
pub mod pubsub;
pub mod registry;

pub use registry::ConnectionRegistry;

pub fn conversation_topic(tenant_id: Uuid, conversation_id: Uuid) -> String {
    format!("tenant:{tenant_id}/conversation:{conversation_id}")
}

pub fn user_topic(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("tenant:{tenant_id}/user:{user_id}")
}

/// One publish instruction: a payload addressed to a topic, tagged with
/// the acting user so subscribers can suppress the echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub actor_id: Uuid,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(String),
}

/// The transport seam: Redis pub/sub in production, a capturing stub in
/// tests. Anything with per-topic publish works.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope) -> Result<(), PublishError>;
}

/// Fire-and-forget dispatcher. Failures are logged at the publish
/// boundary and never surface to the caller.
#[derive(Clone)]
pub struct EventFanout {
    publisher: Arc<dyn EventPublisher>,
}

impl EventFanout {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Submit envelopes for delivery without awaiting the transport.
    /// Call only after the triggering write has committed.
    pub fn dispatch(&self, envelopes: Vec<Envelope>) {
        if envelopes.is_empty() {
            return;
        }
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            for envelope in envelopes {
                if let Err(e) = publisher.publish(&envelope).await {
                    tracing::warn!(topic = %envelope.topic, error = %e, "event fan-out failed");
                }
            }
        });
    }
}

/// Publisher that records envelopes instead of sending them. Test
/// support for suites that assert on fan-out behaviour.
#[derive(Clone, Default)]
pub struct CapturePublisher {
    published: Arc<Mutex<Vec<Envelope>>>,
}

impl CapturePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<Envelope> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for CapturePublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        self.published.lock().await.push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_tenant_scoped() {
        let tenant = Uuid::new_v4();
        let conversation = Uuid::new_v4();
        let topic = conversation_topic(tenant, conversation);
        assert_eq!(topic, format!("tenant:{tenant}/conversation:{conversation}"));
        assert!(user_topic(tenant, conversation).starts_with(&format!("tenant:{tenant}/user:")));
    }

    #[tokio::test]
    async fn dispatch_is_best_effort_and_detached() {
        struct FailingPublisher;

        #[async_trait]
        impl EventPublisher for FailingPublisher {
            async fn publish(&self, _envelope: &Envelope) -> Result<(), PublishError> {
                Err(PublishError::Transport("down".into()))
            }
        }

        let fanout = EventFanout::new(Arc::new(FailingPublisher));
        // Must not panic or propagate the failure.
        fanout.dispatch(vec![Envelope {
            topic: "tenant:x/conversation:y".into(),
            actor_id: Uuid::new_v4(),
            payload: serde_json::json!({}),
        }]);
        tokio::task::yield_now().await;
    }
}
