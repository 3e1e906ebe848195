use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

/// One-level-deep reply reference: enough for the client to render the
/// quoted bubble without another round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub id: Uuid,
    pub content: Option<String>,
    pub sender: Option<UserSummary>,
}

/// Message as returned to clients and carried in fan-out events.
///
/// `deleted_by` is included so each client can drop messages hidden
/// "for me"; messages deleted for everyone never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserSummary,
    pub receiver_id: Option<Uuid>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub reply_to: Option<ReplyPreview>,
    pub reactions: Vec<Reaction>,
    pub deleted_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}
