use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;
use crate::services::PresenceBroadcaster;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

/// Broadcast an ephemeral typing signal. Nothing is stored; the response
/// is empty on success.
pub async fn set_typing(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<TypingRequest>,
) -> Result<StatusCode, AppError> {
    let envelopes =
        PresenceBroadcaster::set_typing(state.store.as_ref(), &identity, id, body.is_typing)
            .await?;
    state.fanout.dispatch(envelopes);
    Ok(StatusCode::ACCEPTED)
}
