use uuid::Uuid;

use crate::error::AppError;
use crate::fanout::events::DomainEvent;
use crate::fanout::Envelope;
use crate::middleware::guards::Identity;
use crate::models::conversation::{
    ConversationChanges, ConversationSummary, ConversationWithParticipants,
};
use crate::models::{ConversationKind, Page, ParticipantRole};
use crate::store::{NewConversation, Store};

use super::ConversationAccess;

const MAX_NAME_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone)]
pub struct CreateConversation {
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub participant_ids: Vec<Uuid>,
}

/// Conversation lifecycle: create/get/list/update/delete.
pub struct ConversationStore;

impl ConversationStore {
    /// Create a conversation and its initial participant rows in one
    /// atomic write. The creator is added implicitly and gets the admin
    /// role; everyone else joins as member. All validation happens
    /// before anything is written.
    pub async fn create(
        store: &dyn Store,
        identity: &Identity,
        req: CreateConversation,
    ) -> Result<ConversationWithParticipants, AppError> {
        match req.kind {
            ConversationKind::Direct => {
                if req.name.is_some() {
                    return Err(AppError::Validation(
                        "direct conversations are unnamed".into(),
                    ));
                }
            }
            ConversationKind::Group | ConversationKind::Channel => {
                let name = req.name.as_deref().map(str::trim).unwrap_or_default();
                if name.is_empty() {
                    return Err(AppError::Validation(format!(
                        "{} conversations require a name",
                        req.kind.as_str()
                    )));
                }
                if name.len() > MAX_NAME_LEN {
                    return Err(AppError::Validation(format!(
                        "name too long (max {MAX_NAME_LEN})"
                    )));
                }
            }
        }
        if let Some(description) = &req.description {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(AppError::Validation(format!(
                    "description too long (max {MAX_DESCRIPTION_LEN})"
                )));
            }
        }

        // Creator first, deduplicated.
        let mut ids = vec![identity.user_id];
        for id in &req.participant_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        for id in &ids {
            if !store.user_in_tenant(identity.tenant_id, *id).await? {
                return Err(AppError::InvalidParticipant(*id));
            }
        }
        if req.kind == ConversationKind::Direct && ids.len() != 2 {
            return Err(AppError::Validation(
                "a direct conversation has exactly two participants".into(),
            ));
        }

        let rows: Vec<(Uuid, ParticipantRole)> = ids
            .into_iter()
            .map(|id| {
                let role = if id == identity.user_id {
                    ParticipantRole::Admin
                } else {
                    ParticipantRole::Member
                };
                (id, role)
            })
            .collect();

        let conversation = store
            .create_conversation(
                NewConversation {
                    tenant_id: identity.tenant_id,
                    kind: req.kind,
                    name: req.name,
                    description: req.description,
                    is_private: req.is_private,
                    created_by: identity.user_id,
                },
                &rows,
            )
            .await?;
        let participants = store.participants(conversation.id).await?;
        Ok(ConversationWithParticipants {
            conversation,
            participants,
        })
    }

    pub async fn get(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<ConversationWithParticipants, AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        let participants = store.participants(conversation_id).await?;
        Ok(ConversationWithParticipants {
            conversation: access.conversation,
            participants,
        })
    }

    /// Conversations the requester participates in, newest activity
    /// first, annotated with unread count and last message. The elevated
    /// role sees the whole tenant, never beyond it.
    pub async fn list(
        store: &dyn Store,
        identity: &Identity,
        page: Page,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        store
            .list_conversations(
                identity.tenant_id,
                identity.user_id,
                !identity.elevated,
                page,
            )
            .await
    }

    /// Mutate name/description/privacy. Creator or elevated role only.
    pub async fn update(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
        changes: ConversationChanges,
    ) -> Result<(ConversationWithParticipants, Vec<Envelope>), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        if identity.user_id != access.conversation.created_by && !identity.elevated {
            return Err(AppError::AccessDenied);
        }
        if changes.is_empty() {
            return Err(AppError::Validation("no fields to update".into()));
        }
        if let Some(name) = &changes.name {
            if access.conversation.kind == ConversationKind::Direct {
                return Err(AppError::Validation(
                    "direct conversations are unnamed".into(),
                ));
            }
            if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
                return Err(AppError::Validation(format!(
                    "name must be 1..={MAX_NAME_LEN} characters"
                )));
            }
        }
        if let Some(description) = &changes.description {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(AppError::Validation(format!(
                    "description too long (max {MAX_DESCRIPTION_LEN})"
                )));
            }
        }

        let conversation = store
            .update_conversation(identity.tenant_id, conversation_id, changes)
            .await?;
        let participants = store.participants(conversation_id).await?;
        let event = DomainEvent::ConversationUpdated {
            conversation: conversation.clone(),
            participants: participants.iter().map(|p| p.user_id).collect(),
        };
        let envelopes = event.envelopes(identity.tenant_id, identity.user_id);
        Ok((
            ConversationWithParticipants {
                conversation,
                participants,
            },
            envelopes,
        ))
    }

    /// Delete the conversation, cascading to participants and messages.
    /// Restricted to conversation admins and the elevated role.
    pub async fn delete(
        store: &dyn Store,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<(), AppError> {
        let access = ConversationAccess::verify(store, identity, conversation_id).await?;
        if !access.is_conversation_admin() && !identity.elevated {
            return Err(AppError::AccessDenied);
        }
        store
            .delete_conversation(identity.tenant_id, conversation_id)
            .await
    }
}
