use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::models::conversation::{
    ConversationChanges, ConversationSummary, ConversationWithParticipants,
};
use crate::models::{ConversationKind, Page};
use crate::services::{ConversationStore, CreateConversation};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<i64>,
}

impl From<&PageQuery> for Page {
    fn from(q: &PageQuery) -> Self {
        Page::new(q.page, q.per_page)
    }
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateConversationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationWithParticipants>), AppError> {
    let created = ConversationStore::create(
        state.store.as_ref(),
        &identity,
        CreateConversation {
            kind: body.kind,
            name: body.name,
            description: body.description,
            is_private: body.is_private,
            participant_ids: body.participant_ids,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let summaries =
        ConversationStore::list(state.store.as_ref(), &identity, Page::from(&query)).await?;
    Ok(Json(summaries))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationWithParticipants>, AppError> {
    let found = ConversationStore::get(state.store.as_ref(), &identity, id).await?;
    Ok(Json(found))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateConversationRequest>,
) -> Result<Json<ConversationWithParticipants>, AppError> {
    let changes = ConversationChanges {
        name: body.name,
        description: body.description,
        is_private: body.is_private,
    };
    let (updated, envelopes) =
        ConversationStore::update(state.store.as_ref(), &identity, id, changes).await?;
    state.fanout.dispatch(envelopes);
    Ok(Json(updated))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ConversationStore::delete(state.store.as_ref(), &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
