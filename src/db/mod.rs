mod link;
mod session;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use link::{Link, LinkStore};
pub use session::{NewSession, Session, SessionStore};
pub use user::{NewUser, User, UserStore};

/// True if `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let (url, max_connections) = if path == ":memory:" {
            // Every connection to sqlite::memory: is a separate database.
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    hashed_password TEXT NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    email TEXT UNIQUE NOT NULL,
                    password_changed_at TEXT,
                    created_at TEXT NOT NULL
                )",
                "CREATE TABLE links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    code TEXT UNIQUE NOT NULL,
                    link TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_links_user_id ON links(user_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // One row per issued refresh token, keyed by the token's payload id
                "CREATE TABLE sessions (
                    id BLOB PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    refresh_token TEXT NOT NULL,
                    client_ip TEXT NOT NULL,
                    user_agent TEXT NOT NULL,
                    is_blocked INTEGER NOT NULL DEFAULT 0,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_sessions_user_id ON sessions(user_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the session store.
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.pool.clone())
    }

    /// Get the link store.
    pub fn links(&self) -> LinkStore {
        LinkStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username,
            hashed_password: "hash",
            first_name: "Ada",
            last_name: "Lovelace",
            email,
        }
    }

    fn new_session(id: Uuid, user_id: i64, expires_in: Duration) -> NewSession<'static> {
        NewSession {
            id,
            user_id,
            refresh_token: "v1.local.token",
            client_ip: "127.0.0.1",
            user_agent: "test-agent",
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let fetched = db.users().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.hashed_password, "hash");
        assert!(fetched.password_changed_at.is_none());

        let fetched = db.users().get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create(new_user("alice", "a1@example.com"))
            .await
            .unwrap();
        let err = db
            .users()
            .create(new_user("alice", "a2@example.com"))
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::open(":memory:").await.unwrap();

        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();
        assert!(db.users().delete(user.id).await.unwrap());

        assert!(db.users().get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let id = Uuid::new_v4();
        let created = db
            .sessions()
            .create(new_session(id, user.id, Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(created.id, id);
        assert!(!created.is_blocked);

        let fetched = db.sessions().get(id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user.id);
        assert_eq!(fetched.client_ip, "127.0.0.1");
        assert_eq!(fetched.user_agent, "test-agent");
        assert_eq!(fetched.expires_at, created.expires_at);

        assert!(db.sessions().get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_block_session() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let id = Uuid::new_v4();
        let created = db
            .sessions()
            .create(new_session(id, user.id, Duration::hours(1)))
            .await
            .unwrap();

        let blocked = db.sessions().block(id).await.unwrap().unwrap();
        assert!(blocked.is_blocked);
        assert_eq!(blocked.expires_at, created.expires_at);

        // Blocking again is a no-op
        let blocked = db.sessions().block(id).await.unwrap().unwrap();
        assert!(blocked.is_blocked);

        assert!(db.sessions().block(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_sessions() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let active = Uuid::new_v4();
        let blocked = Uuid::new_v4();
        let expired = Uuid::new_v4();
        for (id, ttl) in [
            (active, Duration::hours(1)),
            (blocked, Duration::hours(1)),
            (expired, -Duration::hours(1)),
        ] {
            db.sessions()
                .create(new_session(id, user.id, ttl))
                .await
                .unwrap();
        }
        db.sessions().block(blocked).await.unwrap();

        for id in [active, blocked, expired] {
            assert!(db.sessions().get(id).await.unwrap().is_some());
        }

        let listed = db
            .sessions()
            .list_active_by_user(user.id, 10, 0)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active);
    }

    #[tokio::test]
    async fn test_link_lifecycle() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let link = db
            .links()
            .create(user.id, "abc", "https://example.com/")
            .await
            .unwrap();
        assert!(link.active);

        let fetched = db.links().get_by_code("abc").await.unwrap().unwrap();
        assert_eq!(fetched.id, link.id);

        let toggled = db.links().toggle_active(link.id).await.unwrap().unwrap();
        assert!(!toggled.active);

        let renamed = db
            .links()
            .update_code(link.id, "xyz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.code, "xyz");
        assert!(db.links().get_by_code("abc").await.unwrap().is_none());

        let listed = db.links().list_by_user(user.id, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        db.links()
            .create(user.id, "abc", "https://example.com/")
            .await
            .unwrap();
        let err = db
            .links()
            .create(user.id, "abc", "https://example.org/")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
