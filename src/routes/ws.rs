use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::error::AppError;
use crate::fanout::{conversation_topic, user_topic};
use crate::middleware::guards::Identity;
use crate::services::ConversationAccess;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub conversation_id: Uuid,
}

/// WebSocket subscription for one conversation. The socket receives the
/// conversation's events plus the caller's personal topic (membership
/// notifications). The caller's own actions are never echoed back.
pub async fn ws_handler(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // Membership is checked before the upgrade so unauthorized callers
    // get a plain HTTP error instead of a dropped socket.
    ConversationAccess::verify(state.store.as_ref(), &identity, params.conversation_id).await?;

    let conversation_rx = state
        .registry
        .subscribe(
            &conversation_topic(identity.tenant_id, params.conversation_id),
            identity.user_id,
        )
        .await;
    let personal_rx = state
        .registry
        .subscribe(
            &user_topic(identity.tenant_id, identity.user_id),
            identity.user_id,
        )
        .await;

    Ok(ws.on_upgrade(move |socket| relay(socket, conversation_rx, personal_rx)))
}

async fn relay(
    socket: WebSocket,
    mut conversation_rx: UnboundedReceiver<Message>,
    mut personal_rx: UnboundedReceiver<Message>,
) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = conversation_rx.recv() => {
                let Some(msg) = outbound else { break };
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            outbound = personal_rx.recv() => {
                let Some(msg) = outbound else { break };
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by the framework; inbound text is
                    // ignored, all writes go through the HTTP API.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    // Dropping the receivers lets the registry prune this subscriber on
    // the next broadcast.
}
