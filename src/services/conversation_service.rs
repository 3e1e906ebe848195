use crate::error::AppError;
use crate::models::{ConversationView, LastMessage, UserSummary};
use crate::services::directory_service::{unknown_user, DirectoryService, ROLE_ADMIN};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const DEFAULT_GROUP_NAME: &str = "Untitled Group";

/// Canonical key for a direct conversation: the unordered pair, sorted.
pub fn direct_pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Resolve the participant set of a new group: class rosters plus
/// individually selected non-administrators, deduplicated with order
/// preserved, plus the creator unless the creator is an administrator.
pub fn group_participants(
    class_member_ids: &[Uuid],
    individual_ids: &[Uuid],
    creator_id: Uuid,
    creator_is_admin: bool,
) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut participants = Vec::new();
    for id in class_member_ids.iter().chain(individual_ids.iter()) {
        if seen.insert(*id) {
            participants.push(*id);
        }
    }
    if !creator_is_admin && seen.insert(creator_id) {
        participants.push(creator_id);
    }
    participants
}

pub struct ConversationService;

impl ConversationService {
    pub async fn is_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let rec = sqlx::query(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }

    /// Find the direct conversation for the unordered pair, creating it when
    /// absent. Returns (conversation id, created). Concurrent first calls
    /// collide on the partial unique index and converge on a single row.
    pub async fn find_or_create_direct(
        db: &Pool<Postgres>,
        user_id: Uuid,
        participant_id: Uuid,
    ) -> Result<(Uuid, bool), AppError> {
        if user_id == participant_id {
            return Err(AppError::Validation(
                "cannot start a conversation with yourself".into(),
            ));
        }
        let (low, high) = direct_pair_key(user_id, participant_id);

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM conversations WHERE is_group = FALSE AND direct_key_low = $1 AND direct_key_high = $2",
        )
        .bind(low)
        .bind(high)
        .fetch_optional(db)
        .await?;
        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO conversations (id, is_group, created_by, direct_key_low, direct_key_high) \
             VALUES ($1, FALSE, $2, $3, $4) \
             ON CONFLICT (direct_key_low, direct_key_high) WHERE is_group = FALSE DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(low)
        .bind(high)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Lost the creation race; the winner's row is authoritative
            tx.rollback().await?;
            let id: Uuid = sqlx::query_scalar(
                "SELECT id FROM conversations WHERE is_group = FALSE AND direct_key_low = $1 AND direct_key_high = $2",
            )
            .bind(low)
            .bind(high)
            .fetch_one(db)
            .await?;
            return Ok((id, false));
        }

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2), ($1, $3)",
        )
        .bind(id)
        .bind(user_id)
        .bind(participant_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(conversation_id = %id, "direct conversation created");
        Ok((id, true))
    }

    /// Create a group conversation from class rosters and individually
    /// selected users. Administrators are never auto-added and never become
    /// the group's admin of record.
    pub async fn create_group(
        db: &Pool<Postgres>,
        creator_id: Uuid,
        group_name: &str,
        class_ids: &[Uuid],
        individual_user_ids: &[Uuid],
    ) -> Result<Uuid, AppError> {
        let class_member_ids = DirectoryService::class_member_ids(db, class_ids).await?;
        let individual_ids = DirectoryService::non_admin_ids(db, individual_user_ids).await?;
        let creator_role = DirectoryService::user_role(db, creator_id).await?;
        let creator_is_admin = creator_role.as_deref() == Some(ROLE_ADMIN);

        let participants =
            group_participants(&class_member_ids, &individual_ids, creator_id, creator_is_admin);
        if participants.is_empty() {
            return Err(AppError::Validation("group has no participants".into()));
        }

        let name = group_name.trim();
        let name = if name.is_empty() {
            DEFAULT_GROUP_NAME
        } else {
            name
        };
        let group_admin = if creator_is_admin {
            None
        } else {
            Some(creator_id)
        };

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, is_group, group_name, group_admin, created_by) \
             VALUES ($1, TRUE, $2, $3, $4)",
        )
        .bind(id)
        .bind(name)
        .bind(group_admin)
        .bind(creator_id)
        .execute(&mut *tx)
        .await?;

        for user_id in &participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(conversation_id = %id, participants = participants.len(), "group conversation created");
        Ok(id)
    }

    /// Full conversation snapshot: participants resolved, unread counts as a
    /// per-user map. Used for responses and fan-out payloads.
    pub async fn snapshot(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> Result<ConversationView, AppError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("conversation"))?;

        let mut views = Self::build_views(db, vec![row]).await?;
        views.pop().ok_or(AppError::NotFound("conversation"))
    }

    /// Conversations the user participates in and has not soft-deleted,
    /// most recently updated first.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<ConversationView>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT c.*
            FROM conversations c
            JOIN conversation_participants cp ON c.id = cp.conversation_id
            WHERE cp.user_id = $1 AND cp.deleted_for = FALSE
            ORDER BY c.updated_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Self::build_views(db, rows).await
    }

    pub async fn require_exists(db: &Pool<Postgres>, conversation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("conversation"))?;
        Ok(())
    }

    /// Reset the caller's unread count after reading the conversation.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        Self::require_exists(db, conversation_id).await?;
        let result = sqlx::query(
            "UPDATE conversation_participants SET unread_count = 0 \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Forbidden("not a participant".into()));
        }
        Ok(())
    }

    /// Soft-delete for one user. The conversation itself is never removed.
    pub async fn hide_for_user(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        Self::require_exists(db, conversation_id).await?;
        let result = sqlx::query(
            "UPDATE conversation_participants SET deleted_for = TRUE \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Forbidden("not a participant".into()));
        }
        Ok(())
    }

    /// Pin a message belonging to this conversation, or clear the pin.
    pub async fn pin_message(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        Self::require_exists(db, conversation_id).await?;
        if !Self::is_participant(db, conversation_id, user_id).await? {
            return Err(AppError::Forbidden("not a participant".into()));
        }
        if let Some(message_id) = message_id {
            let belongs = sqlx::query(
                "SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2",
            )
            .bind(message_id)
            .bind(conversation_id)
            .fetch_optional(db)
            .await?;
            if belongs.is_none() {
                return Err(AppError::Validation(
                    "message does not belong to this conversation".into(),
                ));
            }
        }
        sqlx::query("UPDATE conversations SET pinned_message_id = $1 WHERE id = $2")
            .bind(message_id)
            .bind(conversation_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Batch-resolve conversation rows into views: one query for all
    /// participant rows, one for all user summaries.
    async fn build_views(
        db: &Pool<Postgres>,
        rows: Vec<PgRow>,
    ) -> Result<Vec<ConversationView>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let conversation_ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();

        let participant_rows = sqlx::query(
            "SELECT conversation_id, user_id, unread_count \
             FROM conversation_participants WHERE conversation_id = ANY($1) \
             ORDER BY joined_at ASC",
        )
        .bind(&conversation_ids)
        .fetch_all(db)
        .await?;

        let mut participants_by_conv: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut unread_by_conv: HashMap<Uuid, HashMap<Uuid, i32>> = HashMap::new();
        let mut all_user_ids: Vec<Uuid> = Vec::new();
        for row in participant_rows {
            let conv: Uuid = row.get("conversation_id");
            let user: Uuid = row.get("user_id");
            let unread: i32 = row.get("unread_count");
            participants_by_conv.entry(conv).or_default().push(user);
            unread_by_conv.entry(conv).or_default().insert(user, unread);
            if !all_user_ids.contains(&user) {
                all_user_ids.push(user);
            }
        }

        let summaries = DirectoryService::user_summaries(db, &all_user_ids).await?;

        let views = rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                let last_message_id: Option<Uuid> = row.get("last_message_id");
                let last_message_content: Option<String> = row.get("last_message_content");
                let last_message_at: Option<DateTime<Utc>> = row.get("last_message_at");
                let last_message = match (last_message_id, last_message_content, last_message_at) {
                    (Some(id), Some(content), Some(timestamp)) => Some(LastMessage {
                        id,
                        content,
                        timestamp,
                    }),
                    _ => None,
                };
                let participants: Vec<UserSummary> = participants_by_conv
                    .remove(&id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|uid| summaries.get(&uid).cloned().unwrap_or_else(|| unknown_user(uid)))
                    .collect();

                ConversationView {
                    id,
                    is_group: row.get("is_group"),
                    group_name: row.get("group_name"),
                    group_admin: row.get("group_admin"),
                    created_by: row.get("created_by"),
                    participants,
                    last_message,
                    unread_counts: unread_by_conv.remove(&id).unwrap_or_default(),
                    pinned_message_id: row.get("pinned_message_id"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                }
            })
            .collect();
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_pair_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_pair_key(a, b), direct_pair_key(b, a));
        let (low, high) = direct_pair_key(a, b);
        assert!(low <= high);
    }

    #[test]
    fn group_participants_unions_and_dedups() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();
        let creator = Uuid::new_v4();

        // u2 selected both via class and individually
        let participants = group_participants(&[u1, u2], &[u2, u3], creator, false);
        assert_eq!(participants, vec![u1, u2, u3, creator]);
    }

    #[test]
    fn group_participants_skips_admin_creator() {
        let u1 = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let participants = group_participants(&[u1], &[], creator, true);
        assert_eq!(participants, vec![u1]);
    }

    #[test]
    fn group_participants_creator_already_member() {
        let creator = Uuid::new_v4();
        let participants = group_participants(&[creator], &[], creator, false);
        assert_eq!(participants, vec![creator]);
    }
}
