//! Read-only queries against the user/class directory. The directory is
//! owned by the school-administration CRUD side; the messaging core only
//! resolves display fields, roles and class rosters from it.

use crate::error::AppError;
use crate::models::UserSummary;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";

pub struct DirectoryService;

impl DirectoryService {
    pub async fn user_summaries(
        db: &Pool<Postgres>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, UserSummary>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT id, name, email, avatar, role FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(db)
        .await?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            out.insert(
                id,
                UserSummary {
                    id,
                    name: row.get("name"),
                    email: row.get("email"),
                    avatar: row.get("avatar"),
                    role: row.get("role"),
                },
            );
        }
        Ok(out)
    }

    pub async fn user_role(db: &Pool<Postgres>, id: Uuid) -> Result<Option<String>, AppError> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(role)
    }

    /// User ids enrolled in any of the given classes.
    pub async fn class_member_ids(
        db: &Pool<Postgres>,
        class_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM class_members WHERE class_id = ANY($1)",
        )
        .bind(class_ids)
        .fetch_all(db)
        .await?;
        Ok(ids)
    }

    /// Filter the given ids down to existing non-administrator users.
    pub async fn non_admin_ids(db: &Pool<Postgres>, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1) AND role <> $2")
                .bind(ids)
                .bind(ROLE_ADMIN)
                .fetch_all(db)
                .await?;
        Ok(ids)
    }
}

pub fn unknown_user(id: Uuid) -> UserSummary {
    UserSummary {
        id,
        name: "Unknown user".into(),
        email: None,
        avatar: None,
        role: "unknown".into(),
    }
}
