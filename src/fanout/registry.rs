use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Subscriber {
    user_id: Uuid,
    tx: UnboundedSender<Message>,
}

/// In-process registry of WebSocket subscribers per topic. Delivery
/// excludes the acting user: their own connection applies changes
/// optimistically and must not receive an echo.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, topic: &str, user_id: Uuid) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { user_id, tx });
        rx
    }

    /// Send to every subscriber of the topic except the actor, dropping
    /// subscribers whose connection has gone away.
    pub async fn broadcast_excluding(&self, topic: &str, actor_id: Uuid, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(topic) {
            list.retain(|sub| {
                if sub.user_id == actor_id {
                    return !sub.tx.is_closed();
                }
                sub.tx.send(msg.clone()).is_ok()
            });
            if list.is_empty() {
                guard.remove(topic);
            }
        }
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .get(topic)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_skips_the_actor() {
        let registry = ConnectionRegistry::new();
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut actor_rx = registry.subscribe("t", actor).await;
        let mut other_rx = registry.subscribe("t", other).await;

        registry
            .broadcast_excluding("t", actor, Message::Text("hi".into()))
            .await;

        assert!(other_rx.try_recv().is_ok());
        assert!(actor_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_subscribers_are_pruned() {
        let registry = ConnectionRegistry::new();
        let gone = Uuid::new_v4();
        let alive = Uuid::new_v4();

        let rx = registry.subscribe("t", gone).await;
        drop(rx);
        let _alive_rx = registry.subscribe("t", alive).await;
        assert_eq!(registry.subscriber_count("t").await, 2);

        registry
            .broadcast_excluding("t", Uuid::new_v4(), Message::Text("hi".into()))
            .await;
        assert_eq!(registry.subscriber_count("t").await, 1);
    }
}
