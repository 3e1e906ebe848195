use crate::error::AppError;
use crate::models::{MessageView, Reaction, ReplyPreview};
use crate::services::conversation_service::ConversationService;
use crate::services::directory_service::{unknown_user, DirectoryService};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// Snapshot text cached on the conversation. Any message carrying a file
/// snapshots as the marker, even when it also has text.
pub const ATTACHMENT_MARKER: &str = "\u{1F4CE} Sent an attachment";

pub fn last_message_snapshot(content: Option<&str>, has_file: bool) -> Option<String> {
    if has_file {
        return Some(ATTACHMENT_MARKER.to_string());
    }
    match content.map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => None,
    }
}

/// A message needs text or an attachment, never neither.
pub fn validate_body(content: Option<&str>, file_url: Option<&str>) -> Result<(), AppError> {
    let has_content = content.map(str::trim).is_some_and(|c| !c.is_empty());
    let has_file = file_url.map(str::trim).is_some_and(|f| !f.is_empty());
    if !has_content && !has_file {
        return Err(AppError::Validation(
            "content or file required".into(),
        ));
    }
    Ok(())
}

/// Toggle semantics for reactions: at most one emoji per user per message.
/// Repeating the current emoji removes it; anything else sets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOp {
    Set,
    Remove,
}

pub fn reaction_op(existing: Option<&str>, incoming: &str) -> ReactionOp {
    match existing {
        Some(current) if current == incoming => ReactionOp::Remove,
        _ => ReactionOp::Set,
    }
}

/// A receiver id is only meaningful for direct conversations.
pub fn direct_receiver(is_group: bool, requested: Option<Uuid>) -> Option<Uuid> {
    if is_group {
        None
    } else {
        requested
    }
}

/// The cached last-message text tracks edits only while the edited message
/// is still the conversation's last message.
pub fn snapshot_sync_needed(last_message_id: Option<Uuid>, edited_id: Uuid) -> bool {
    last_message_id == Some(edited_id)
}

pub struct NewMessage<'a> {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub content: Option<&'a str>,
    pub file_url: Option<&'a str>,
    pub reply_to: Option<Uuid>,
}

pub struct MessageService;

impl MessageService {
    /// Persist a message and keep the conversation in step: overwrite the
    /// last-message snapshot and bump every other participant's unread
    /// count by one, all inside a single transaction.
    pub async fn send(db: &Pool<Postgres>, msg: NewMessage<'_>) -> Result<MessageView, AppError> {
        validate_body(msg.content, msg.file_url)?;

        let is_group: bool =
            sqlx::query_scalar("SELECT is_group FROM conversations WHERE id = $1")
                .bind(msg.conversation_id)
                .fetch_optional(db)
                .await?
                .ok_or(AppError::NotFound("conversation"))?;

        if !ConversationService::is_participant(db, msg.conversation_id, msg.sender_id).await? {
            return Err(AppError::Forbidden("not a participant".into()));
        }

        if let Some(reply_to) = msg.reply_to {
            let in_conversation =
                sqlx::query("SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2")
                    .bind(reply_to)
                    .bind(msg.conversation_id)
                    .fetch_optional(db)
                    .await?;
            if in_conversation.is_none() {
                return Err(AppError::Validation(
                    "reply target does not belong to this conversation".into(),
                ));
            }
        }

        let receiver_id = direct_receiver(is_group, msg.receiver_id);
        let has_file = msg.file_url.map(str::trim).is_some_and(|f| !f.is_empty());
        let snapshot = last_message_snapshot(msg.content, has_file);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = db.begin().await?;
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, file_url, reply_to, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(msg.conversation_id)
        .bind(msg.sender_id)
        .bind(receiver_id)
        .bind(msg.content)
        .bind(msg.file_url)
        .bind(msg.reply_to)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET last_message_id = $1, last_message_content = $2, \
             last_message_at = $3, updated_at = NOW() WHERE id = $4",
        )
        .bind(id)
        .bind(&snapshot)
        .bind(now)
        .bind(msg.conversation_id)
        .execute(&mut *tx)
        .await?;

        // Atomic per-row increment; the sender's own count never moves
        sqlx::query(
            "UPDATE conversation_participants SET unread_count = unread_count + 1 \
             WHERE conversation_id = $1 AND user_id <> $2",
        )
        .bind(msg.conversation_id)
        .bind(msg.sender_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::fetch_view(db, id).await
    }

    /// Re-read a message with sender and reply chain resolved one level
    /// deep, so a single round trip gives the caller a displayable record.
    pub async fn fetch_view(db: &Pool<Postgres>, message_id: Uuid) -> Result<MessageView, AppError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("message"))?;

        let mut views = Self::build_views(db, vec![row]).await?;
        views.pop().ok_or(AppError::NotFound("message"))
    }

    /// Message history in ascending timestamp order. Messages deleted for
    /// everyone never leave the server; per-user deletions travel as
    /// `deleted_by` for the client to filter.
    pub async fn history(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageView>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM messages \
             WHERE conversation_id = $1 AND is_deleted_for_everyone = FALSE \
             ORDER BY created_at ASC \
             LIMIT 500",
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;

        Self::build_views(db, rows).await
    }

    /// Edit a message in place, sender-only. When the edited message is the
    /// conversation's cached last message, the snapshot is updated in the
    /// same transaction so the two never diverge.
    pub async fn edit(
        db: &Pool<Postgres>,
        message_id: Uuid,
        editor_id: Uuid,
        content: &str,
    ) -> Result<MessageView, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("content required".into()));
        }

        let row = sqlx::query("SELECT sender_id, conversation_id FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("message"))?;
        let sender_id: Uuid = row.get("sender_id");
        let conversation_id: Uuid = row.get("conversation_id");
        if sender_id != editor_id {
            return Err(AppError::Forbidden("only the sender can edit".into()));
        }

        let mut tx = db.begin().await?;
        sqlx::query("UPDATE messages SET content = $1, edited_at = NOW() WHERE id = $2")
            .bind(content)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        // Lock the conversation row so the snapshot decision and the write
        // see the same last_message_id
        let last_message_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT last_message_id FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await?;
        if snapshot_sync_needed(last_message_id, message_id) {
            sqlx::query("UPDATE conversations SET last_message_content = $1 WHERE id = $2")
                .bind(content)
                .bind(conversation_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Self::fetch_view(db, message_id).await
    }

    /// Toggle a reaction: same emoji removes it, anything else sets it.
    /// The (message, user) row is locked for the read-modify-write and the
    /// set path is an upsert, so concurrent toggles cannot lose updates or
    /// trip the primary key.
    pub async fn react(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<MessageView, AppError> {
        if emoji.is_empty() || emoji.len() > 20 {
            return Err(AppError::Validation("invalid emoji".into()));
        }

        sqlx::query("SELECT 1 FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("message"))?;

        let mut tx = db.begin().await?;
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT emoji FROM message_reactions WHERE message_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match reaction_op(existing.as_deref(), emoji) {
            ReactionOp::Remove => {
                sqlx::query(
                    "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2",
                )
                .bind(message_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            // Upsert: a concurrent first reaction from the same user must
            // land on the existing row instead of tripping the primary key
            ReactionOp::Set => {
                sqlx::query(
                    "INSERT INTO message_reactions (message_id, user_id, emoji) VALUES ($1, $2, $3) \
                     ON CONFLICT (message_id, user_id) DO UPDATE SET emoji = EXCLUDED.emoji",
                )
                .bind(message_id)
                .bind(user_id)
                .bind(emoji)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;

        Self::fetch_view(db, message_id).await
    }

    /// Delete a message. "For everyone" is sender-only and irreversible;
    /// "for me" hides it for the acting user and is idempotent.
    /// Returns the owning conversation id for fan-out.
    pub async fn delete(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: Uuid,
        for_everyone: bool,
    ) -> Result<Uuid, AppError> {
        let row = sqlx::query("SELECT sender_id, conversation_id FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound("message"))?;
        let sender_id: Uuid = row.get("sender_id");
        let conversation_id: Uuid = row.get("conversation_id");

        if for_everyone {
            if sender_id != user_id {
                return Err(AppError::Forbidden(
                    "only the sender can delete for everyone".into(),
                ));
            }
            sqlx::query("UPDATE messages SET is_deleted_for_everyone = TRUE WHERE id = $1")
                .bind(message_id)
                .execute(db)
                .await?;
        } else {
            sqlx::query(
                "INSERT INTO message_deletions (message_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(message_id)
            .bind(user_id)
            .execute(db)
            .await?;
        }
        Ok(conversation_id)
    }

    /// Batch-resolve message rows into views: reactions, deletions, reply
    /// previews and sender summaries each in one query.
    async fn build_views(
        db: &Pool<Postgres>,
        rows: Vec<PgRow>,
    ) -> Result<Vec<MessageView>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let message_ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();

        let reaction_rows = sqlx::query(
            "SELECT message_id, user_id, emoji FROM message_reactions WHERE message_id = ANY($1)",
        )
        .bind(&message_ids)
        .fetch_all(db)
        .await?;
        let mut reactions_map: HashMap<Uuid, Vec<Reaction>> = HashMap::new();
        for row in reaction_rows {
            let message_id: Uuid = row.get("message_id");
            reactions_map.entry(message_id).or_default().push(Reaction {
                user_id: row.get("user_id"),
                emoji: row.get("emoji"),
            });
        }

        let deletion_rows = sqlx::query(
            "SELECT message_id, user_id FROM message_deletions WHERE message_id = ANY($1)",
        )
        .bind(&message_ids)
        .fetch_all(db)
        .await?;
        let mut deletions_map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in deletion_rows {
            let message_id: Uuid = row.get("message_id");
            deletions_map
                .entry(message_id)
                .or_default()
                .push(row.get("user_id"));
        }

        // Reply previews, one level deep
        let reply_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|r| r.get::<Option<Uuid>, _>("reply_to"))
            .collect();
        let mut replies_map: HashMap<Uuid, (Option<String>, Uuid)> = HashMap::new();
        if !reply_ids.is_empty() {
            let reply_rows =
                sqlx::query("SELECT id, content, sender_id FROM messages WHERE id = ANY($1)")
                    .bind(&reply_ids)
                    .fetch_all(db)
                    .await?;
            for row in reply_rows {
                let id: Uuid = row.get("id");
                replies_map.insert(id, (row.get("content"), row.get("sender_id")));
            }
        }

        let mut user_ids: Vec<Uuid> = rows.iter().map(|r| r.get("sender_id")).collect();
        user_ids.extend(replies_map.values().map(|(_, sender)| *sender));
        user_ids.sort();
        user_ids.dedup();
        let summaries = DirectoryService::user_summaries(db, &user_ids).await?;

        let views = rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                let sender_id: Uuid = row.get("sender_id");
                let reply_to: Option<Uuid> = row.get("reply_to");
                let created_at: DateTime<Utc> = row.get("created_at");
                let edited_at: Option<DateTime<Utc>> = row.get("edited_at");

                let reply_preview = reply_to.map(|reply_id| {
                    match replies_map.get(&reply_id) {
                        Some((content, reply_sender)) => ReplyPreview {
                            id: reply_id,
                            content: content.clone(),
                            sender: Some(
                                summaries
                                    .get(reply_sender)
                                    .cloned()
                                    .unwrap_or_else(|| unknown_user(*reply_sender)),
                            ),
                        },
                        None => ReplyPreview {
                            id: reply_id,
                            content: None,
                            sender: None,
                        },
                    }
                });

                MessageView {
                    id,
                    conversation_id: row.get("conversation_id"),
                    sender: summaries
                        .get(&sender_id)
                        .cloned()
                        .unwrap_or_else(|| unknown_user(sender_id)),
                    receiver_id: row.get("receiver_id"),
                    content: row.get("content"),
                    file_url: row.get("file_url"),
                    reply_to: reply_preview,
                    reactions: reactions_map.remove(&id).unwrap_or_default(),
                    deleted_by: deletions_map.remove(&id).unwrap_or_default(),
                    created_at,
                    edited_at,
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
    fn snapshot_marks_any_message_with_attachment() {
        // the marker wins even when the message also carries text
        assert_eq!(
            last_message_snapshot(Some("hello"), true),
            Some(ATTACHMENT_MARKER.to_string())
        );
        assert_eq!(
            last_message_snapshot(None, true),
            Some(ATTACHMENT_MARKER.to_string())
        );
    }

    #[test]
    fn snapshot_uses_content_without_attachment() {
        assert_eq!(
            last_message_snapshot(Some("hello"), false),
            Some("hello".to_string())
        );
    }

    #[test]
    fn snapshot_empty_without_content_or_file() {
        assert_eq!(last_message_snapshot(None, false), None);
        assert_eq!(last_message_snapshot(Some("   "), false), None);
    }

    #[test]
    fn body_validation_requires_content_or_file() {
        assert!(validate_body(None, None).is_err());
        assert!(validate_body(Some("  "), None).is_err());
        assert!(validate_body(Some("hi"), None).is_ok());
        assert!(validate_body(None, Some("report.pdf")).is_ok());
    }

    #[test]
    fn reaction_toggle_semantics() {
        // first reaction sets
        assert_eq!(reaction_op(None, "\u{1F44D}"), ReactionOp::Set);
        // same emoji twice removes
        assert_eq!(reaction_op(Some("\u{1F44D}"), "\u{1F44D}"), ReactionOp::Remove);
        // different emoji replaces, which is also a set
        assert_eq!(reaction_op(Some("\u{1F44D}"), "\u{2764}"), ReactionOp::Set);
    }

    #[test]
    fn receiver_only_kept_for_direct_conversations() {
        let receiver = Uuid::new_v4();
        assert_eq!(direct_receiver(false, Some(receiver)), Some(receiver));
        assert_eq!(direct_receiver(true, Some(receiver)), None);
        assert_eq!(direct_receiver(false, None), None);
    }

    #[test]
    fn edit_syncs_snapshot_only_for_last_message() {
        let edited = Uuid::new_v4();
        assert!(snapshot_sync_needed(Some(edited), edited));
        assert!(!snapshot_sync_needed(Some(Uuid::new_v4()), edited));
        assert!(!snapshot_sync_needed(None, edited));
    }
}
