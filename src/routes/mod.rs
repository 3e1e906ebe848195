use crate::state::AppState;
use axum::middleware;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub mod conversations;
use conversations::{
    create_group, find_or_create_direct, hide_conversation, list_conversations, mark_read,
    pin_message,
};
pub mod messages;
use messages::{
    delete_message, edit_message, get_message_history, react_to_message, send_message,
};
use crate::websocket::handlers::ws_handler;

pub fn build_router(state: AppState) -> Router<AppState> {
    // Liveness stays public for healthchecks
    let introspection = Router::new().route("/health", get(|| async { "OK" }));

    let api_v1 = Router::new()
        // Messages
        .route("/messages", post(send_message))
        .route("/messages/:id", put(edit_message))
        .route("/messages/:id/react", put(react_to_message))
        .route("/messages/:id/delete", put(delete_message))
        // Conversations
        .route("/conversations", get(list_conversations))
        .route("/conversations/find-or-create", post(find_or_create_direct))
        .route("/conversations/groups", post(create_group))
        .route("/conversations/:id", delete(hide_conversation))
        .route("/conversations/:id/messages", get(get_message_history))
        .route("/conversations/:id/read", post(mark_read))
        .route("/conversations/:id/pin", put(pin_message))
        // WebSocket endpoint
        .route("/ws", get(ws_handler));

    let secured_api_v1 = api_v1.layer(middleware::from_fn_with_state(
        state,
        crate::middleware::auth::auth_middleware,
    ));

    let router = introspection.merge(Router::new().nest("/api/v1", secured_api_v1));

    crate::middleware::with_defaults(router)
}
