use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::MessageView;
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::{MessageService, NewMessage};
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, participant_channels, ChatEvent};
use crate::websocket::ChannelId;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    /// Absent on the very first message of a not-yet-existing direct chat;
    /// `receiver_id` is required in that case.
    pub conversation_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub reply_to: Option<Uuid>,
}

/// POST /api/v1/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(sender_id): Extension<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), AppError> {
    // First message into a direct chat that does not exist yet: create the
    // conversation on the fly and announce it as `firstMessage`.
    let (conversation_id, conversation_created) = match body.conversation_id {
        Some(id) => (id, false),
        None => {
            let receiver = body.receiver_id.ok_or_else(|| {
                AppError::Validation("conversation_id or receiver_id required".into())
            })?;
            ConversationService::find_or_create_direct(&state.db, sender_id, receiver).await?
        }
    };

    let message = MessageService::send(
        &state.db,
        NewMessage {
            conversation_id,
            sender_id,
            receiver_id: body.receiver_id,
            content: body.content.as_deref(),
            file_url: body.file_url.as_deref(),
            reply_to: body.reply_to,
        },
    )
    .await?;

    let conversation = ConversationService::snapshot(&state.db, conversation_id).await?;
    let participants: Vec<Uuid> = conversation.participants.iter().map(|p| p.id).collect();
    let channels = participant_channels(&participants, conversation_id);

    broadcast_event(
        &state.registry,
        &state.redis,
        &channels,
        &ChatEvent::NewMessage {
            message: message.clone(),
        },
    )
    .await;
    broadcast_event(
        &state.registry,
        &state.redis,
        &channels,
        &ChatEvent::ConversationCreated {
            conversation: conversation.clone(),
        },
    )
    .await;
    if conversation_created {
        broadcast_event(
            &state.registry,
            &state.redis,
            &channels,
            &ChatEvent::FirstMessage { conversation },
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/conversations/:id/messages
/// History in ascending timestamp order, participants only.
pub async fn get_message_history(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    ConversationService::require_exists(&state.db, conversation_id).await?;
    if !ConversationService::is_participant(&state.db, conversation_id, user_id).await? {
        return Err(AppError::Forbidden(
            "not authorized to view this conversation".into(),
        ));
    }
    let messages = MessageService::history(&state.db, conversation_id).await?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

/// PUT /api/v1/messages/:id
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(message_id): Path<Uuid>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<MessageView>, AppError> {
    let message = MessageService::edit(&state.db, message_id, user_id, &body.content).await?;

    broadcast_event(
        &state.registry,
        &state.redis,
        &[ChannelId::Conversation(message.conversation_id)],
        &ChatEvent::MessageEdited {
            message: message.clone(),
        },
    )
    .await;

    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct ReactRequest {
    pub emoji: String,
}

/// PUT /api/v1/messages/:id/react
pub async fn react_to_message(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(message_id): Path<Uuid>,
    Json(body): Json<ReactRequest>,
) -> Result<Json<MessageView>, AppError> {
    let message = MessageService::react(&state.db, message_id, user_id, &body.emoji).await?;

    broadcast_event(
        &state.registry,
        &state.redis,
        &[ChannelId::Conversation(message.conversation_id)],
        &ChatEvent::MessageReacted {
            message: message.clone(),
        },
    )
    .await;

    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct DeleteMessageRequest {
    #[serde(default)]
    pub for_everyone: bool,
}

/// PUT /api/v1/messages/:id/delete
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(message_id): Path<Uuid>,
    Json(body): Json<DeleteMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let conversation_id =
        MessageService::delete(&state.db, message_id, user_id, body.for_everyone).await?;

    broadcast_event(
        &state.registry,
        &state.redis,
        &[ChannelId::Conversation(conversation_id)],
        &ChatEvent::MessageDeleted {
            id: message_id,
            for_everyone: body.for_everyone,
            user_id,
        },
    )
    .await;

    Ok(Json(json!({ "message": "delete status updated" })))
}
