use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display fields resolved from the user directory (external collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
}
