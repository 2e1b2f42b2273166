use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// A short code pointing at a target URL.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub link: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

const LINK_COLUMNS: &str = "id, user_id, code, link, active, created_at";

#[derive(Clone)]
pub struct LinkStore {
    pool: SqlitePool,
}

impl LinkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an active link. Fails with a unique violation if `code` is taken.
    pub async fn create(&self, user_id: i64, code: &str, link: &str) -> Result<Link, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO links (user_id, code, link, active, created_at) VALUES (?, ?, ?, 1, ?)
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(user_id)
        .bind(code)
        .bind(link)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM links WHERE code = ?"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    /// List a user's links in creation order.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Link>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE user_id = ? ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Flip the active flag. Returns None if the link does not exist.
    pub async fn toggle_active(&self, id: i64) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE links SET active = NOT active WHERE id = ? RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Change the short code. Fails with a unique violation if `code` is taken.
    pub async fn update_code(&self, id: i64, code: &str) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE links SET code = ? WHERE id = ? RETURNING {LINK_COLUMNS}"
        ))
        .bind(code)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
