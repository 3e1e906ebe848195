use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ConversationView;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, participant_channels, ChatEvent};

/// GET /api/v1/conversations
/// Conversations for the caller, most recently updated first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<ConversationView>>, AppError> {
    let conversations = ConversationService::list_for_user(&state.db, user_id).await?;
    Ok(Json(conversations))
}

#[derive(Deserialize)]
pub struct FindOrCreateRequest {
    pub participant_id: Uuid,
}

/// POST /api/v1/conversations/find-or-create
/// The direct conversation for {caller, participant}, created on first use.
pub async fn find_or_create_direct(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<FindOrCreateRequest>,
) -> Result<Json<ConversationView>, AppError> {
    let (conversation_id, created) =
        ConversationService::find_or_create_direct(&state.db, user_id, body.participant_id)
            .await?;
    let conversation = ConversationService::snapshot(&state.db, conversation_id).await?;

    if created {
        let participants: Vec<Uuid> = conversation.participants.iter().map(|p| p.id).collect();
        let channels = participant_channels(&participants, conversation_id);
        broadcast_event(
            &state.registry,
            &state.redis,
            &channels,
            &ChatEvent::ConversationCreated {
                conversation: conversation.clone(),
            },
        )
        .await;
    }

    Ok(Json(conversation))
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub class_ids: Vec<Uuid>,
    #[serde(default)]
    pub individual_user_ids: Vec<Uuid>,
}

/// POST /api/v1/conversations/groups
pub async fn create_group(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<ConversationView>), AppError> {
    let conversation_id = ConversationService::create_group(
        &state.db,
        user_id,
        &body.group_name,
        &body.class_ids,
        &body.individual_user_ids,
    )
    .await?;
    let conversation = ConversationService::snapshot(&state.db, conversation_id).await?;

    let participants: Vec<Uuid> = conversation.participants.iter().map(|p| p.id).collect();
    let channels = participant_channels(&participants, conversation_id);
    broadcast_event(
        &state.registry,
        &state.redis,
        &channels,
        &ChatEvent::ConversationCreated {
            conversation: conversation.clone(),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// POST /api/v1/conversations/:id/read
/// Reset the caller's unread count.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ConversationService::mark_read(&state.db, conversation_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PinRequest {
    pub message_id: Option<Uuid>,
}

/// PUT /api/v1/conversations/:id/pin
/// Pin a message of this conversation, or clear the pin with null.
pub async fn pin_message(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<PinRequest>,
) -> Result<StatusCode, AppError> {
    ConversationService::pin_message(&state.db, conversation_id, user_id, body.message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/conversations/:id
/// Soft-delete the conversation for the caller only.
pub async fn hide_conversation(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ConversationService::hide_for_user(&state.db, conversation_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
