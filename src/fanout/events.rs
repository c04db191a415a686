//! Domain events and their wire shape.
//!
//! Every payload is a flat JSON object with the same top-level fields:
//!
//! ```json
//! {
//!     "type": "message.sent",
//!     "timestamp": "2026-08-25T10:30:00Z",
//!     "actor_id": "uuid",
//!     "conversation_id": "uuid",
//!     ...event data
//! }
//! ```

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Conversation, Message, ParticipantRole};

use super::{conversation_topic, user_topic, Envelope};

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    /// A message was appended to the log.
    MessageSent { message: Message },

    /// A user became a participant. Also addressed to that user's
    /// personal topic so their other views learn about the membership.
    ParticipantJoined {
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    },

    /// Conversation metadata changed, or its last message moved (fired on
    /// every append so list views can refresh ordering).
    ConversationUpdated {
        conversation: Conversation,
        participants: Vec<Uuid>,
    },

    /// Ephemeral typing indicator. Never persisted; staleness is a
    /// client concern.
    Typing {
        conversation_id: Uuid,
        is_typing: bool,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageSent { .. } => "message.sent",
            Self::ParticipantJoined { .. } => "participant.joined",
            Self::ConversationUpdated { .. } => "conversation.updated",
            Self::Typing { .. } => "typing",
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::MessageSent { message } => message.conversation_id,
            Self::ParticipantJoined {
                conversation_id, ..
            } => *conversation_id,
            Self::ConversationUpdated { conversation, .. } => conversation.id,
            Self::Typing {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    fn payload(&self, actor_id: Uuid) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "type": self.event_type(),
            "timestamp": Utc::now().to_rfc3339(),
            "actor_id": actor_id,
            "conversation_id": self.conversation_id(),
        });
        // Flatten the event data into the top-level object.
        if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) {
            for (key, value) in map {
                payload[key] = value;
            }
        }
        payload
    }

    /// Build the publish instructions for this event: the conversation
    /// topic, plus the joined user's personal topic for membership
    /// changes.
    pub fn envelopes(&self, tenant_id: Uuid, actor_id: Uuid) -> Vec<Envelope> {
        let payload = self.payload(actor_id);
        let mut out = vec![Envelope {
            topic: conversation_topic(tenant_id, self.conversation_id()),
            actor_id,
            payload: payload.clone(),
        }];
        if let Self::ParticipantJoined { user_id, .. } = self {
            out.push(Envelope {
                topic: user_topic(tenant_id, *user_id),
                actor_id,
                payload,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;

    fn message(conversation_id: Uuid, author_id: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            author_id,
            sequence: 1,
            content: "hello".into(),
            kind: MessageKind::Text,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            edited_at: None,
            deleted: false,
        }
    }

    #[test]
    fn payload_is_flat_with_common_fields() {
        let conversation_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let event = DomainEvent::Typing {
            conversation_id,
            is_typing: true,
        };
        let envelopes = event.envelopes(Uuid::new_v4(), actor);
        assert_eq!(envelopes.len(), 1);
        let payload = &envelopes[0].payload;
        assert_eq!(payload["type"], "typing");
        assert_eq!(payload["conversation_id"], conversation_id.to_string());
        assert_eq!(payload["actor_id"], actor.to_string());
        assert_eq!(payload["is_typing"], true);
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn join_also_targets_personal_topic() {
        let tenant = Uuid::new_v4();
        let conversation_id = Uuid::new_v4();
        let joined = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let event = DomainEvent::ParticipantJoined {
            conversation_id,
            user_id: joined,
            role: ParticipantRole::Member,
        };
        let envelopes = event.envelopes(tenant, actor);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].topic, conversation_topic(tenant, conversation_id));
        assert_eq!(envelopes[1].topic, user_topic(tenant, joined));
        assert!(envelopes.iter().all(|e| e.actor_id == actor));
    }

    #[test]
    fn message_sent_carries_the_message() {
        let conversation_id = Uuid::new_v4();
        let author = Uuid::new_v4();
        let event = DomainEvent::MessageSent {
            message: message(conversation_id, author),
        };
        let envelopes = event.envelopes(Uuid::new_v4(), author);
        let payload = &envelopes[0].payload;
        assert_eq!(payload["type"], "message.sent");
        assert_eq!(payload["message"]["content"], "hello");
        assert_eq!(payload["message"]["sequence"], 1);
    }
}
