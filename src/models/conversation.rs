use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::user::UserSummary;

/// Denormalized snapshot of the most recent message. A cache, not a join:
/// the messages table stays the source of truth for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation as returned to clients and carried in fan-out events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub is_group: bool,
    pub group_name: String,
    pub group_admin: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<LastMessage>,
    pub unread_counts: HashMap<Uuid, i32>,
    pub pinned_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
