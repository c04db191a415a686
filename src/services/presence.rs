use uuid::Uuid;

use crate::error::AppError;
use crate::fanout::events::DomainEvent;
use crate::fanout::Envelope;
use crate::middleware::guards::Identity;
use crate::store::Store;

use super::ConversationAccess;

/// Ephemeral typing signals. Nothing is persisted; a stale
/// `is_typing: true` is the client's problem to expire.
pub struct PresenceBroadcaster;

impl PresenceBroadcaster {
    pub async fn set_typing(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        is_typing: bool,
    ) -> Result<Vec<Envelope>, AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        access.require_participant()?;
        let event = DomainEvent::Typing {
            conversation_id,
            is_typing,
        };
        Ok(event.envelopes(identity.tenant_id, identity.user_id))
    }
}
