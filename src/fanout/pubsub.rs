//! Redis-backed transport. Every instance publishes envelopes to the
//! topic channel and runs one pattern-subscribed listener that feeds its
//! local connection registry. Local delivery goes through the listener
//! too, so there is exactly one delivery path.

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::StreamExt;
use redis::AsyncCommands;

use super::{ConnectionRegistry, Envelope, EventPublisher, PublishError};

const TOPIC_PATTERN: &str = "tenant:*";

#[derive(Clone)]
pub struct RedisPublisher {
    client: redis::Client,
}

impl RedisPublisher {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let body = serde_json::to_string(envelope)?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        conn.publish::<_, _, ()>(&envelope.topic, body)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Run the pub/sub listener until the connection drops. Subscribes to
/// every tenant topic and forwards payloads to local WebSocket
/// subscribers, excluding the acting user.
pub async fn run_listener(
    client: redis::Client,
    registry: ConnectionRegistry,
) -> redis::RedisResult<()> {
    // Pub/sub needs a dedicated connection, not the multiplexed one.
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe(TOPIC_PATTERN).await?;
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let body: String = msg.get_payload()?;
        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed fan-out envelope");
                continue;
            }
        };
        let text = envelope.payload.to_string();
        registry
            .broadcast_excluding(&envelope.topic, envelope.actor_id, Message::Text(text.into()))
            .await;
    }
    Ok(())
}
