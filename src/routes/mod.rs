use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod conversations;
pub mod messages;
pub mod participants;
pub mod typing;
pub mod ws;

use conversations::{
    create_conversation, delete_conversation, get_conversation, list_conversations,
    update_conversation,
};
use messages::{delete_message, list_messages, mark_as_read, send_message, update_message};
use participants::{add_participants, remove_participant};
use typing::set_typing;
use ws::ws_handler;

pub fn build_router() -> Router<AppState> {
    // Health endpoint stays public for load balancer checks.
    let introspection = Router::new().route("/health", get(|| async { "OK" }));

    let api_v1 = Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(get_conversation)
                .patch(update_conversation)
                .delete(delete_conversation),
        )
        .route("/conversations/{id}/participants", post(add_participants))
        .route(
            "/conversations/{id}/participants/{user_id}",
            axum::routing::delete(remove_participant),
        )
        .route(
            "/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/conversations/{id}/messages/{message_id}",
            axum::routing::patch(update_message).delete(delete_message),
        )
        .route("/conversations/{id}/messages/read", post(mark_as_read))
        .route("/conversations/{id}/typing", post(set_typing))
        .route("/ws", get(ws_handler));

    let secured_api_v1 = api_v1.layer(middleware::from_fn(
        crate::middleware::auth::identity_middleware,
    ));

    let router = introspection.merge(Router::new().nest("/api/v1", secured_api_v1));

    crate::middleware::with_defaults(router)
}
