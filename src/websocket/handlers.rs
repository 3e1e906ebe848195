use crate::services::conversation_service::ConversationService;
use crate::state::AppState;
use crate::websocket::ChannelId;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::unbounded_channel;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    /// Join a conversation channel while the conversation is open.
    Subscribe { conversation_id: Uuid },
    Unsubscribe { conversation_id: Uuid },
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let session_id = Uuid::new_v4();
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = unbounded_channel::<Message>();

    // Every session sits on its own user channel for the connection lifetime.
    state
        .registry
        .subscribe(ChannelId::User(user_id), session_id, tx.clone())
        .await;
    tracing::info!(%user_id, %session_id, "websocket session connected");

    let forward = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut conversation_channels: Vec<ChannelId> = Vec::new();
    while let Some(Ok(msg)) = source.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "ignoring malformed client frame");
                continue;
            }
        };
        match frame {
            ClientFrame::Subscribe { conversation_id } => {
                match ConversationService::is_participant(&state.db, conversation_id, user_id)
                    .await
                {
                    Ok(true) => {
                        let channel = ChannelId::Conversation(conversation_id);
                        state.registry.subscribe(channel, session_id, tx.clone()).await;
                        if !conversation_channels.contains(&channel) {
                            conversation_channels.push(channel);
                        }
                    }
                    Ok(false) => {
                        tracing::warn!(%user_id, %conversation_id, "subscribe rejected: not a participant");
                    }
                    Err(e) => {
                        // Membership unknown, fail closed
                        tracing::error!(%user_id, %conversation_id, error = %e, "subscribe rejected: membership check failed");
                    }
                }
            }
            ClientFrame::Unsubscribe { conversation_id } => {
                let channel = ChannelId::Conversation(conversation_id);
                state.registry.unsubscribe(channel, session_id).await;
                conversation_channels.retain(|c| *c != channel);
            }
        }
    }

    state
        .registry
        .unsubscribe(ChannelId::User(user_id), session_id)
        .await;
    for channel in conversation_channels {
        state.registry.unsubscribe(channel, session_id).await;
    }
    forward.abort();
    tracing::info!(%user_id, %session_id, "websocket session closed");
}
