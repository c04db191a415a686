use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::fanout::events::DomainEvent;
use crate::fanout::Envelope;
use crate::middleware::guards::Identity;
use crate::models::{Message, MessageKind, Page};
use crate::store::{NewMessage, Store};

use super::ConversationAccess;

/// Deployment policy knobs for the message log.
#[derive(Debug, Clone, Copy)]
pub struct MessagePolicy {
    /// Whether the elevated role may edit other users' messages.
    pub allow_elevated_edit: bool,
    pub max_message_len: usize,
}

impl From<&Config> for MessagePolicy {
    fn from(config: &Config) -> Self {
        Self {
            allow_elevated_edit: config.allow_elevated_edit,
            max_message_len: config.max_message_len,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppendMessage {
    pub content: String,
    pub kind: MessageKind,
    pub metadata: serde_json::Value,
}

/// Append-only, strictly ordered per-conversation message log.
pub struct MessageLog;

impl MessageLog {
    /// Append a message. Authors must be participants — the elevated
    /// role does not bypass this. The store assigns the sequence; the
    /// returned envelopes carry both the message event and the
    /// conversation-updated refresh for list views.
    pub async fn append(
        store: &dyn Store,
        identity: &Identity,
        policy: MessagePolicy,
        conversation_id: Uuid,
        req: AppendMessage,
    ) -> Result<(Message, Vec<Envelope>), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        access.require_participant()?;
        if req.content.trim().is_empty() {
            return Err(AppError::Validation("message content is empty".into()));
        }
        if req.content.len() > policy.max_message_len {
            return Err(AppError::Validation(format!(
                "message too long (max {} bytes)",
                policy.max_message_len
            )));
        }

        let message = store
            .append_message(NewMessage {
                conversation_id,
                author_id: identity.user_id,
                content: req.content,
                kind: req.kind,
                metadata: req.metadata,
            })
            .await?;

        let participants = store.participants(conversation_id).await?;
        let mut conversation = access.conversation;
        conversation.last_sequence = message.sequence;

        let mut envelopes = DomainEvent::MessageSent {
            message: message.clone(),
        }
        .envelopes(identity.tenant_id, identity.user_id);
        envelopes.extend(
            DomainEvent::ConversationUpdated {
                conversation,
                participants: participants.iter().map(|p| p.user_id).collect(),
            }
            .envelopes(identity.tenant_id, identity.user_id),
        );

        Ok((message, envelopes))
    }

    /// Author-only edit; the elevated role qualifies when the
    /// deployment's policy says so. Sequence and ordering are untouched.
    pub async fn edit(
        store: &dyn Store,
        identity: &Identity,
        policy: MessagePolicy,
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> Result<Message, AppError> {
        ConversationAccess::verify(store, identity, conversation_id).await?;
        let message = store
            .message(conversation_id, message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let permitted = message.author_id == identity.user_id
            || (policy.allow_elevated_edit && identity.elevated);
        if !permitted {
            return Err(AppError::AccessDenied);
        }
        if content.trim().is_empty() {
            return Err(AppError::Validation("message content is empty".into()));
        }
        if content.len() > policy.max_message_len {
            return Err(AppError::Validation(format!(
                "message too long (max {} bytes)",
                policy.max_message_len
            )));
        }
        store.edit_message(conversation_id, message_id, content).await
    }

    /// Soft delete by the author, a conversation admin, or the elevated
    /// role. The row keeps its sequence slot; readers see a redacted
    /// tombstone.
    pub async fn soft_delete(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        let message = store
            .message(conversation_id, message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let permitted = message.author_id == identity.user_id
            || access.is_conversation_admin()
            || identity.elevated;
        if !permitted {
            return Err(AppError::AccessDenied);
        }
        store.soft_delete_message(conversation_id, message_id).await
    }

    /// Page of messages in insertion order, tombstones redacted.
    pub async fn list(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        page: Page,
    ) -> Result<Vec<Message>, AppError> {
        ConversationAccess::verify(store, identity, conversation_id).await?;
        let messages = store.messages(conversation_id, page).await?;
        Ok(messages.into_iter().map(Message::redacted).collect())
    }
}
