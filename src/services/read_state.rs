use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::store::Store;

use super::ConversationAccess;

/// Per-participant read pointers and the unread counts derived from
/// them. A participant's pointer is only ever moved by that user.
pub struct ReadStateTracker;

impl ReadStateTracker {
    /// Snapshot the requester's read pointer to the conversation's
    /// current maximum sequence. A message appended concurrently may or
    /// may not be covered; that race is acceptable.
    pub async fn mark_read(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<i64, AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        access.require_participant()?;
        store.mark_read(conversation_id, identity.user_id).await
    }

    /// Count of messages past the requester's pointer. The requester's
    /// own messages never count as unread, and deleted tombstones are
    /// skipped.
    pub async fn unread_count(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<i64, AppError> {
        ConversationAccess::verify(store, identity, conversation_id).await?;
        store.unread_count(conversation_id, identity.user_id).await
    }
}
