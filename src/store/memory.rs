//! In-memory store used by the test suites and local development. Same
//! contract as the Postgres implementation, including sequence
//! serialization and idempotent participant inserts.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::{ConversationChanges, ConversationSummary};
use crate::models::{
    Conversation, Message, Page, Participant, ParticipantRole,
};

use super::{NewConversation, NewMessage, Store};

#[derive(Default)]
struct Inner {
    users: HashSet<(Uuid, Uuid)>,
    conversations: HashMap<Uuid, Conversation>,
    participants: HashMap<Uuid, Vec<Participant>>,
    messages: HashMap<Uuid, Vec<Message>>,
}

/// Single-mutex store: every operation is trivially atomic, which is
/// exactly the serialization the contract asks for.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in a tenant's directory (identity-service stand-in).
    pub async fn register_user(&self, tenant_id: Uuid, user_id: Uuid) {
        self.inner.lock().await.users.insert((tenant_id, user_id));
    }
}

fn unread(inner: &Inner, conversation_id: Uuid, user_id: Uuid) -> i64 {
    let Some(participant) = inner
        .participants
        .get(&conversation_id)
        .and_then(|list| list.iter().find(|p| p.user_id == user_id))
    else {
        return 0;
    };
    inner
        .messages
        .get(&conversation_id)
        .map(|msgs| {
            msgs.iter()
                .filter(|m| {
                    m.sequence > participant.read_pointer
                        && m.author_id != user_id
                        && !m.deleted
                })
                .count() as i64
        })
        .unwrap_or(0)
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.inner.lock().await.users.contains(&(tenant_id, user_id)))
    }

    async fn create_conversation(
        &self,
        new: NewConversation,
        participants: &[(Uuid, ParticipantRole)],
    ) -> Result<Conversation, AppError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            kind: new.kind,
            name: new.name,
            description: new.description,
            is_private: new.is_private,
            created_by: new.created_by,
            last_sequence: 0,
            created_at: now,
            updated_at: now,
        };
        let rows = participants
            .iter()
            .map(|(user_id, role)| Participant {
                conversation_id: conversation.id,
                user_id: *user_id,
                role: *role,
                read_pointer: 0,
                joined_at: now,
            })
            .collect();
        inner.conversations.insert(conversation.id, conversation.clone());
        inner.participants.insert(conversation.id, rows);
        inner.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .conversations
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_conversations(
        &self,
        tenant_id: Uuid,
        requester: Uuid,
        only_participating: bool,
        page: Page,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let inner = self.inner.lock().await;
        let mut conversations: Vec<&Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| {
                !only_participating
                    || inner
                        .participants
                        .get(&c.id)
                        .is_some_and(|list| list.iter().any(|p| p.user_id == requester))
            })
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let out = conversations
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|c| ConversationSummary {
                conversation: c.clone(),
                unread_count: unread(&inner, c.id, requester),
                last_message: inner
                    .messages
                    .get(&c.id)
                    .and_then(|msgs| msgs.last().cloned())
                    .map(Message::redacted),
            })
            .collect();
        Ok(out)
    }

    async fn update_conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: ConversationChanges,
    ) -> Result<Conversation, AppError> {
        let mut inner = self.inner.lock().await;
        let conversation = inner
            .conversations
            .get_mut(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or(AppError::NotFound)?;
        if let Some(name) = changes.name {
            conversation.name = Some(name);
        }
        if let Some(description) = changes.description {
            conversation.description = Some(description);
        }
        if let Some(is_private) = changes.is_private {
            conversation.is_private = is_private;
        }
        conversation.updated_at = Utc::now();
        Ok(conversation.clone())
    }

    async fn delete_conversation(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        match inner.conversations.get(&id) {
            Some(c) if c.tenant_id == tenant_id => {}
            _ => return Err(AppError::NotFound),
        }
        inner.conversations.remove(&id);
        inner.participants.remove(&id);
        inner.messages.remove(&id);
        Ok(())
    }

    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .participants
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .participants
            .get(&conversation_id)
            .and_then(|list| list.iter().find(|p| p.user_id == user_id).cloned()))
    }

    async fn add_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.conversations.contains_key(&conversation_id) {
            return Err(AppError::NotFound);
        }
        let list = inner.participants.entry(conversation_id).or_default();
        if list.iter().any(|p| p.user_id == user_id) {
            return Ok(false);
        }
        list.push(Participant {
            conversation_id,
            user_id,
            role,
            read_pointer: 0,
            joined_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        let Some(list) = inner.participants.get_mut(&conversation_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|p| p.user_id != user_id);
        Ok(list.len() < before)
    }

    async fn participant_count(&self, conversation_id: Uuid) -> Result<i64, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .participants
            .get(&conversation_id)
            .map(|list| list.len() as i64)
            .unwrap_or(0))
    }

    async fn set_participant_role(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let participant = inner
            .participants
            .get_mut(&conversation_id)
            .and_then(|list| list.iter_mut().find(|p| p.user_id == user_id))
            .ok_or(AppError::NotFound)?;
        participant.role = role;
        Ok(())
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let conversation = inner
            .conversations
            .get_mut(&new.conversation_id)
            .ok_or(AppError::NotFound)?;
        conversation.last_sequence += 1;
        conversation.updated_at = now;
        let sequence = conversation.last_sequence;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            author_id: new.author_id,
            sequence,
            content: new.content,
            kind: new.kind,
            metadata: new.metadata,
            created_at: now,
            edited_at: None,
            deleted: false,
        };
        inner
            .messages
            .entry(new.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .get(&conversation_id)
            .and_then(|msgs| msgs.iter().find(|m| m.id == message_id).cloned()))
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> Result<Message, AppError> {
        let mut inner = self.inner.lock().await;
        let message = inner
            .messages
            .get_mut(&conversation_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == message_id))
            .ok_or(AppError::NotFound)?;
        message.content = content;
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }

    async fn soft_delete_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let message = inner
            .messages
            .get_mut(&conversation_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == message_id))
            .ok_or(AppError::NotFound)?;
        message.deleted = true;
        Ok(())
    }

    async fn messages(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .get(&conversation_id)
            .map(|msgs| {
                msgs.iter()
                    .skip(page.offset() as usize)
                    .take(page.limit() as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        let mut inner = self.inner.lock().await;
        let pointer = inner
            .conversations
            .get(&conversation_id)
            .map(|c| c.last_sequence)
            .ok_or(AppError::NotFound)?;
        let participant = inner
            .participants
            .get_mut(&conversation_id)
            .and_then(|list| list.iter_mut().find(|p| p.user_id == user_id))
            .ok_or(AppError::NotFound)?;
        participant.read_pointer = pointer;
        Ok(pointer)
    }

    async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        let inner = self.inner.lock().await;
        Ok(unread(&inner, conversation_id, user_id))
    }
}
