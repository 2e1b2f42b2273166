//! User API endpoints.
//!
//! - POST `/` - Create an account
//! - POST `/login` - Exchange credentials for an access and refresh token pair
//! - GET `/me` - Current user's summary
//! - DELETE `/me` - Delete the current user's account

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, ClientInfo, protect};
use crate::db::{Database, NewSession, NewUser, User, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::password::{hash_password, validate_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_user_create};
use crate::token::{TokenCodec, TokenDurations};

const MAX_USERNAME_LENGTH: usize = 32;
const MAX_NAME_LENGTH: usize = 64;
const MAX_EMAIL_LENGTH: usize = 254;

/// Shared by unknown-user and wrong-password failures.
const INVALID_CREDENTIALS: &str = "username/password is invalid";

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub client_ip_header: Option<String>,
    pub durations: TokenDurations,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let me_router = protect(
        Router::new().route("/me", get(get_me).delete(delete_me)),
        state.clone(),
    )
    .with_state(state.clone());

    let create_router = Router::new()
        .route("/", post(create_user))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_user_create,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config,
            rate_limit_login,
        ));

    Router::new()
        .merge(me_router)
        .merge(create_router)
        .merge(login_router)
}

/// Public view of a user. Never includes the password hash.
#[derive(Serialize)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: user.created_at,
            password_changed_at: user.password_changed_at,
        }
    }
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    password: String,
    email: String,
    first_name: String,
    last_name: String,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "username cannot be longer than {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request(
            "username can only contain letters and numbers",
        ));
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "{field} cannot be longer than {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.len() <= MAX_EMAIL_LENGTH
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ApiError::bad_request("email is invalid"));
    }
    Ok(())
}

async fn create_user(
    State(state): State<UsersState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    let username = payload.username.trim();
    let email = payload.email.trim();
    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();

    validate_username(username)?;
    validate_email(email)?;
    validate_name("first_name", first_name)?;
    validate_name("last_name", last_name)?;
    validate_password(&payload.password).map_err(ApiError::bad_request)?;

    let password = payload.password;
    let hashed_password = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")?;

    let user = match state
        .db
        .users()
        .create(NewUser {
            username,
            hashed_password: &hashed_password,
            first_name,
            last_name,
            email,
        })
        .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("username or email is already taken"));
        }
        Err(e) => return Err(ApiError::internal("Failed to create user", e)),
    };

    tracing::info!(user_id = user.id, "User created");

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    session_id: Uuid,
    access_token: String,
    access_token_expires_at: DateTime<Utc>,
    refresh_token: String,
    refresh_token_expires_at: DateTime<Utc>,
    user: UserSummary,
}

/// Verify credentials, open a session and return both tokens.
async fn login(
    State(state): State<UsersState>,
    client: ClientInfo,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let user = state
        .db
        .users()
        .get_by_username(username)
        .await
        .internal_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found(INVALID_CREDENTIALS))?;

    let password = payload.password;
    let hashed_password = user.hashed_password.clone();
    let verified =
        tokio::task::spawn_blocking(move || verify_password(&password, &hashed_password))
            .await
            .internal_err("Password verification task failed")?
            .internal_err("Failed to verify password")?;

    if !verified {
        tracing::debug!(user_id = user.id, "Wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let (access_token, access_payload) = state
        .codec
        .issue(user.id, state.durations.access)
        .internal_err("Failed to create access token")?;

    let (refresh_token, refresh_payload) = state
        .codec
        .issue(user.id, state.durations.refresh)
        .internal_err("Failed to create refresh token")?;

    // No tokens leave this handler unless the session is stored.
    let session = state
        .db
        .sessions()
        .create(NewSession {
            id: refresh_payload.id,
            user_id: user.id,
            refresh_token: &refresh_token,
            client_ip: &client.ip,
            user_agent: &client.user_agent,
            expires_at: refresh_payload.expires_at,
        })
        .await
        .internal_err("Failed to create session")?;

    tracing::info!(user_id = user.id, session_id = %session.id, "Session created");

    Ok(Json(LoginResponse {
        session_id: session.id,
        access_token,
        access_token_expires_at: access_payload.expires_at,
        refresh_token,
        refresh_token_expires_at: refresh_payload.expires_at,
        user: UserSummary::from(&user),
    }))
}

async fn get_me(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user_id())
        .await
        .internal_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(UserSummary::from(&user)))
}

/// Delete the caller's account. Outstanding access tokens stop working at
/// the identity check; sessions and links are removed with the user.
async fn delete_me(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .users()
        .delete(auth.user_id())
        .await
        .internal_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("user not found"));
    }

    tracing::info!(user_id = auth.user_id(), "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice42").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("alice_b").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email("ab.c").is_err());
        assert!(validate_email("@b.c").is_err());
        assert!(validate_email("a@").is_err());
    }
}
