use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::models::Participant;
use crate::services::{ParticipantRegistry, RemovalOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddParticipantsRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<Participant>,
}

#[derive(Serialize)]
pub struct RemovalResponse {
    pub conversation_deleted: bool,
}

pub async fn add_participants(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<AddParticipantsRequest>,
) -> Result<Json<ParticipantsResponse>, AppError> {
    let (participants, envelopes) =
        ParticipantRegistry::add(state.store.as_ref(), &identity, id, &body.user_ids).await?;
    state.fanout.dispatch(envelopes);
    Ok(Json(ParticipantsResponse { participants }))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RemovalResponse>, AppError> {
    let outcome =
        ParticipantRegistry::remove(state.store.as_ref(), &identity, id, user_id).await?;
    Ok(Json(RemovalResponse {
        conversation_deleted: outcome == RemovalOutcome::ConversationDeleted,
    }))
}
