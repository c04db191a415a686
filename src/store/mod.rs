//! Repository interface over the durable store.
//!
//! Services talk to this trait, never to the database directly. The
//! production implementation is [`postgres::PgStore`]; [`memory::MemoryStore`]
//! is behaviourally identical and backs the test suites and local
//! development.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::{ConversationChanges, ConversationSummary};
use crate::models::{Conversation, ConversationKind, Message, MessageKind, Page, Participant, ParticipantRole};

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub tenant_id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether the user id resolves in the tenant's directory.
    async fn user_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    /// Insert a conversation plus one participant row per entry,
    /// all-or-nothing.
    async fn create_conversation(
        &self,
        new: NewConversation,
        participants: &[(Uuid, ParticipantRole)],
    ) -> Result<Conversation, AppError>;

    /// Tenant-scoped lookup. A conversation in a different tenant is
    /// indistinguishable from an absent one.
    async fn conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, AppError>;

    /// Conversations in the tenant ordered by most recent activity,
    /// annotated with the requester's unread count and the last message.
    /// With `only_participating`, restricted to conversations the
    /// requester is a member of.
    async fn list_conversations(
        &self,
        tenant_id: Uuid,
        requester: Uuid,
        only_participating: bool,
        page: Page,
    ) -> Result<Vec<ConversationSummary>, AppError>;

    async fn update_conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: ConversationChanges,
    ) -> Result<Conversation, AppError>;

    /// Cascades to participants and messages.
    async fn delete_conversation(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError>;

    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>, AppError>;

    async fn participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, AppError>;

    /// Idempotent insert. Returns whether a new row was written; the
    /// second add of the same pair is a no-op.
    async fn add_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<bool, AppError>;

    /// Returns whether a row was removed.
    async fn remove_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn participant_count(&self, conversation_id: Uuid) -> Result<i64, AppError>;

    async fn set_participant_role(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError>;

    /// Append with a server-assigned, strictly monotonic sequence. The
    /// sequence bump and the insert happen in one transaction so
    /// concurrent appenders to the same conversation serialize.
    async fn append_message(&self, new: NewMessage) -> Result<Message, AppError>;

    async fn message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, AppError>;

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> Result<Message, AppError>;

    async fn soft_delete_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), AppError>;

    /// Ascending by sequence, i.e. insertion order.
    async fn messages(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>, AppError>;

    /// Snapshot the participant's read pointer to the conversation's
    /// current maximum sequence. Returns the new pointer.
    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError>;

    /// Messages with `sequence > read_pointer`, excluding the user's own
    /// messages and excluding deleted tombstones. Zero when the user is
    /// not a participant.
    async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError>;
}
