//! The access gate every operation goes through before touching a
//! conversation: tenant match first, then participant membership.

use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::models::{Conversation, Participant};
use crate::store::Store;

/// Proof of access to one conversation, carrying the loaded aggregate
/// so callers don't re-fetch it.
#[derive(Debug, Clone)]
pub struct ConversationAccess {
    pub conversation: Conversation,
    pub participant: Option<Participant>,
    pub elevated: bool,
}

impl ConversationAccess {
    /// Tenant-scoped lookup plus membership check. A conversation that is
    /// absent, in a foreign tenant, or hidden from a non-participant all
    /// produce the same `NotFound` so existence never leaks.
    pub async fn verify(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<Self, AppError> {
        let conversation = store
            .conversation(identity.tenant_id, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let participant = store.participant(conversation_id, identity.user_id).await?;
        if participant.is_none() && !identity.elevated {
            return Err(AppError::NotFound);
        }
        Ok(Self {
            conversation,
            participant,
            elevated: identity.elevated,
        })
    }

    /// Participant row of the requester. Operations that act *as* a
    /// participant (appending, typing, read pointers) need this even for
    /// elevated identities.
    pub fn require_participant(&self) -> Result<&Participant, AppError> {
        self.participant.as_ref().ok_or(AppError::AccessDenied)
    }

    pub fn is_conversation_admin(&self) -> bool {
        self.participant.as_ref().is_some_and(Participant::is_admin)
    }
}
