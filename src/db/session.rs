//! Persisted refresh-token sessions.
//!
//! A session row is created at login, keyed by the refresh token's payload id.
//! Refresh only reads it. Blocking is the sole mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

/// A refresh-token session.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    #[serde(skip)]
    pub refresh_token: String,
    pub client_ip: String,
    pub user_agent: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Fields recorded when a session is opened.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub id: Uuid,
    pub user_id: i64,
    pub refresh_token: &'a str,
    pub client_ip: &'a str,
    pub user_agent: &'a str,
    pub expires_at: DateTime<Utc>,
}

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token, client_ip, user_agent, is_blocked, expires_at, created_at";

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new session. `is_blocked` starts false.
    pub async fn create(&self, session: NewSession<'_>) -> Result<Session, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO sessions (id, user_id, refresh_token, client_ip, user_agent, is_blocked, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.refresh_token)
        .bind(session.client_ip)
        .bind(session.user_agent)
        .bind(session.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    /// Get a session by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a session as blocked. Returns the updated session, or None if
    /// no session has this id.
    pub async fn block(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE sessions SET is_blocked = 1 WHERE id = ? RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the sessions of a user that can still be refreshed.
    pub async fn list_active_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>, sqlx::Error> {
        // Stored timestamps are RFC 3339 in UTC, so text comparison orders them.
        sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_id = ? AND is_blocked = 0 AND expires_at > ?
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(Utc::now())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }
}
