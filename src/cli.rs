//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::token::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, KEY_LENGTH, TokenDurations,
};
use chrono::Duration;
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

const TOKEN_KEY_ENV: &str = "TOKEN_SYMMETRIC_KEY";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "shortlink", about = "Link shortener with bearer token sessions")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SHORTLINK_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "SHORTLINK_DATABASE", default_value = "shortlink.db")]
    pub database: String,

    /// Path to file containing the 32-byte token key. Prefer the TOKEN_SYMMETRIC_KEY env var instead
    #[arg(long)]
    pub token_key_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "SHORTLINK_ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    pub access_token_ttl: u64,

    /// Refresh token (session) lifetime in seconds
    #[arg(long, env = "SHORTLINK_REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS)]
    pub refresh_token_ttl: u64,

    /// Header carrying the client IP, e.g. "x-forwarded-for". Only set this behind a trusted proxy
    #[arg(long, env = "SHORTLINK_CLIENT_IP_HEADER")]
    pub client_ip_header: Option<String>,

    /// Signup and login attempts allowed per client IP per minute
    #[arg(long, env = "SHORTLINK_AUTH_RATE_PER_MINUTE", default_value = "10")]
    pub auth_rate_per_minute: u32,

    /// Block the session with this id so its refresh token stops working, then exit
    #[arg(long)]
    pub block_session: Option<Uuid>,

    /// Log output format
    #[arg(short, long, env = "SHORTLINK_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the token key from the environment variable or a file.
/// Returns None and logs an error if the key cannot be loaded.
pub fn load_token_key(token_key_file: Option<&str>) -> Option<Vec<u8>> {
    let key = if let Ok(key) = std::env::var(TOKEN_KEY_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(TOKEN_KEY_ENV) };
        key
    } else if let Some(path) = token_key_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read token key file");
                return None;
            }
        }
    } else {
        error!(
            "Token key is required. Set {} environment variable (recommended) or use --token-key-file",
            TOKEN_KEY_ENV
        );
        return None;
    };

    if key.len() != KEY_LENGTH {
        error!(
            expected = KEY_LENGTH,
            actual = key.len(),
            "Token key has the wrong length"
        );
        return None;
    }

    Some(key.into_bytes())
}

/// Convert TTLs in seconds to token durations.
/// Returns None and logs an error unless `0 < access < refresh`.
pub fn token_durations(access_secs: u64, refresh_secs: u64) -> Option<TokenDurations> {
    if access_secs == 0 {
        error!("Access token TTL must be positive");
        return None;
    }
    if access_secs >= refresh_secs {
        error!(
            access = access_secs,
            refresh = refresh_secs,
            "Access token TTL must be shorter than refresh token TTL"
        );
        return None;
    }

    let to_duration = |secs: u64| i64::try_from(secs).ok().and_then(Duration::try_seconds);

    match (to_duration(access_secs), to_duration(refresh_secs)) {
        (Some(access), Some(refresh)) => Some(TokenDurations { access, refresh }),
        _ => {
            error!("Token TTL is out of range");
            None
        }
    }
}

/// Handle the --block-session flag. Returns true if the session was blocked.
pub async fn handle_block_session(db: &Database, id: Uuid) -> bool {
    match db.sessions().block(id).await {
        Ok(Some(session)) => {
            info!(session_id = %session.id, user_id = session.user_id, "Session blocked");
            println!();
            println!("Session {} blocked (user {})", session.id, session.user_id);
            println!("Its refresh token will be rejected from now on.");
            println!();
            true
        }
        Ok(None) => {
            error!(session_id = %id, "Session not found");
            false
        }
        Err(e) => {
            error!(session_id = %id, error = %e, "Failed to block session");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    token_key: Vec<u8>,
    durations: TokenDurations,
    client_ip_header: Option<String>,
    auth_rate_per_minute: u32,
) -> ServerConfig {
    ServerConfig {
        db,
        token_key,
        durations,
        client_ip_header,
        auth_rate_per_minute,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewSession;
    use chrono::Utc;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["shortlink"]).unwrap();
        assert_eq!(args.port, 7291);
        assert_eq!(args.database, "shortlink.db");
        assert_eq!(args.access_token_ttl, DEFAULT_ACCESS_TOKEN_TTL_SECS);
        assert_eq!(args.refresh_token_ttl, DEFAULT_REFRESH_TOKEN_TTL_SECS);
        assert_eq!(args.auth_rate_per_minute, 10);
        assert!(args.block_session.is_none());
    }

    #[test]
    fn test_args_block_session() {
        let id = Uuid::new_v4();
        let id_arg = id.to_string();
        let args = Args::try_parse_from(["shortlink", "--block-session", id_arg.as_str()]).unwrap();
        assert_eq!(args.block_session, Some(id));

        assert!(Args::try_parse_from(["shortlink", "--block-session", "nope"]).is_err());
    }

    #[test]
    fn test_token_durations() {
        let durations = token_durations(900, 604800).unwrap();
        assert_eq!(durations, TokenDurations::default());

        assert!(token_durations(0, 60).is_none());
        assert!(token_durations(60, 60).is_none());
        assert!(token_durations(120, 60).is_none());
        assert!(token_durations(60, u64::MAX).is_none());
    }

    #[tokio::test]
    async fn test_handle_block_session() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(crate::db::NewUser {
                username: "alice",
                hashed_password: "hash",
                first_name: "Ada",
                last_name: "Lovelace",
                email: "alice@example.com",
            })
            .await
            .unwrap();

        let id = Uuid::new_v4();
        db.sessions()
            .create(NewSession {
                id,
                user_id: user.id,
                refresh_token: "v1.local.token",
                client_ip: "",
                user_agent: "",
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(handle_block_session(&db, id).await);
        assert!(db.sessions().get(id).await.unwrap().unwrap().is_blocked);

        assert!(!handle_block_session(&db, Uuid::new_v4()).await);
    }
}
