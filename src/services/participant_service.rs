use uuid::Uuid;

use crate::error::AppError;
use crate::fanout::events::DomainEvent;
use crate::fanout::Envelope;
use crate::middleware::guards::Identity;
use crate::models::{ConversationKind, Participant, ParticipantRole};
use crate::store::Store;

use super::ConversationAccess;

/// Outcome of a removal: whether the conversation itself went away
/// because its last participant left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    ParticipantRemoved,
    ConversationDeleted,
}

/// Membership CRUD for a conversation.
pub struct ParticipantRegistry;

impl ParticipantRegistry {
    /// Idempotent adds: already-present users produce no row and no
    /// event. Every id is resolved in the tenant before anything is
    /// written. Direct conversations have a fixed shape and reject adds.
    pub async fn add(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(Vec<Participant>, Vec<Envelope>), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        if access.conversation.kind == ConversationKind::Direct {
            return Err(AppError::Validation(
                "cannot add participants to a direct conversation".into(),
            ));
        }
        for id in user_ids {
            if !store.user_in_tenant(identity.tenant_id, *id).await? {
                return Err(AppError::InvalidParticipant(*id));
            }
        }

        let mut envelopes = Vec::new();
        for id in user_ids {
            let inserted = store
                .add_participant(conversation_id, *id, ParticipantRole::Member)
                .await?;
            if inserted {
                let event = DomainEvent::ParticipantJoined {
                    conversation_id,
                    user_id: *id,
                    role: ParticipantRole::Member,
                };
                envelopes.extend(event.envelopes(identity.tenant_id, identity.user_id));
            }
        }
        let participants = store.participants(conversation_id).await?;
        Ok((participants, envelopes))
    }

    /// Self-removal is always permitted; removing someone else takes a
    /// conversation admin or the elevated role. A conversation whose
    /// last participant leaves is deleted rather than left as an
    /// unreachable shell.
    pub async fn remove(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<RemovalOutcome, AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        if user_id == identity.user_id {
            access.require_participant()?;
        } else if !access.is_conversation_admin() && !identity.elevated {
            return Err(AppError::AccessDenied);
        }

        let removed = store.remove_participant(conversation_id, user_id).await?;
        if !removed {
            return Err(AppError::NotFound);
        }

        if store.participant_count(conversation_id).await? == 0 {
            store
                .delete_conversation(identity.tenant_id, conversation_id)
                .await?;
            return Ok(RemovalOutcome::ConversationDeleted);
        }
        Ok(RemovalOutcome::ParticipantRemoved)
    }

    pub async fn is_participant(
        store: &dyn Store,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(store.participant(conversation_id, user_id).await?.is_some())
    }

    /// Role mutation, admin-only.
    pub async fn set_role(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        if !access.is_conversation_admin() && !identity.elevated {
            return Err(AppError::AccessDenied);
        }
        store
            .set_participant_role(conversation_id, user_id, role)
            .await
    }
}
