use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::models::{Message, MessageKind, Page};
use crate::services::{AppendMessage, MessageLog, MessagePolicy, ReadStateTracker};
use crate::state::AppState;

use super::conversations::PageQuery;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Deserialize)]
pub struct UpdateMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct ReadStateResponse {
    pub read_pointer: i64,
    pub unread_count: i64,
}

pub async fn send_message(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let policy = MessagePolicy::from(state.config.as_ref());
    let (message, envelopes) = MessageLog::append(
        state.store.as_ref(),
        &identity,
        policy,
        id,
        AppendMessage {
            content: body.content,
            kind: body.kind,
            metadata: body.metadata,
        },
    )
    .await?;
    state.fanout.dispatch(envelopes);
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages =
        MessageLog::list(state.store.as_ref(), &identity, id, Page::from(&query)).await?;
    // Reading the log moves the reader's pointer. Elevated observers who
    // are not participants have no pointer to move.
    match ReadStateTracker::mark_read(state.store.as_ref(), &identity, id).await {
        Ok(_) | Err(AppError::AccessDenied) => {}
        Err(e) => return Err(e),
    }
    Ok(Json(messages))
}

pub async fn update_message(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let policy = MessagePolicy::from(state.config.as_ref());
    let message = MessageLog::edit(
        state.store.as_ref(),
        &identity,
        policy,
        id,
        message_id,
        body.content,
    )
    .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    MessageLog::soft_delete(state.store.as_ref(), &identity, id, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Snapshot the caller's read pointer to the current head of the log and
/// report the (now zero) unread count.
pub async fn mark_as_read(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadStateResponse>, AppError> {
    let read_pointer = ReadStateTracker::mark_read(state.store.as_ref(), &identity, id).await?;
    let unread_count = ReadStateTracker::unread_count(state.store.as_ref(), &identity, id).await?;
    Ok(Json(ReadStateResponse {
        read_pointer,
        unread_count,
    }))
}
