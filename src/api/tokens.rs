//! Token API endpoints.
//!
//! - POST `/refresh` - Exchange a refresh token for a new access token
//! - GET `/verify` - Check the current access token
//! - GET `/sessions` - List the caller's refreshable sessions

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::pagination::Pagination;
use crate::auth::{Auth, protect};
use crate::db::{Database, Session};
use crate::impl_has_auth_backend;
use crate::token::{TokenCodec, TokenDurations};

/// Shared by expired and blocked sessions so revocation looks like expiry.
const SESSION_EXPIRED: &str = "session expired";

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub client_ip_header: Option<String>,
    pub durations: TokenDurations,
}

impl_has_auth_backend!(TokensState);

pub fn router(state: TokensState) -> Router {
    let protected = protect(
        Router::new()
            .route("/verify", get(verify_token))
            .route("/sessions", get(list_sessions)),
        state.clone(),
    );

    Router::new()
        .route("/refresh", post(refresh_token))
        .merge(protected)
        .with_state(state)
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
    access_token_expires_at: DateTime<Utc>,
}

/// Exchange a refresh token for a new access token.
///
/// The refresh token is not rotated: it stays usable until it expires or its
/// session is blocked.
async fn refresh_token(
    State(state): State<TokensState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected refresh request body");
        ApiError::bad_request("refresh token not provided")
    })?;
    if request.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh token not provided"));
    }

    let payload = state
        .codec
        .decode(&request.refresh_token)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected refresh token");
            ApiError::unauthorized("invalid token")
        })?;

    let session = match state.db.sessions().get(payload.id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::debug!(session_id = %payload.id, "No session for refresh token");
            return Err(ApiError::bad_request("no session created"));
        }
        Err(e) => {
            tracing::error!(session_id = %payload.id, error = %e, "Failed to get session");
            return Err(ApiError::bad_request("no session created"));
        }
    };

    if session.is_expired() {
        tracing::debug!(session_id = %session.id, "Session expired");
        return Err(ApiError::bad_request(SESSION_EXPIRED));
    }

    if session.is_blocked {
        tracing::info!(session_id = %session.id, "Refresh attempted on blocked session");
        return Err(ApiError::bad_request(SESSION_EXPIRED));
    }

    let (access_token, access_payload) = state
        .codec
        .issue(session.user_id, state.durations.access)
        .internal_err("Failed to create access token")?;

    tracing::info!(
        user_id = session.user_id,
        session_id = %session.id,
        "Access token refreshed"
    );

    Ok(Json(RefreshResponse {
        access_token,
        access_token_expires_at: access_payload.expires_at,
    }))
}

#[derive(Serialize)]
struct VerifyResponse {
    subject_id: i64,
    expires_at: DateTime<Utc>,
}

/// Report who the current access token belongs to and when it expires.
async fn verify_token(Auth(auth): Auth) -> impl IntoResponse {
    Json(VerifyResponse {
        subject_id: auth.payload.subject_id,
        expires_at: auth.payload.expires_at,
    })
}

#[derive(Serialize)]
struct ListSessionsResponse {
    sessions: Vec<Session>,
}

async fn list_sessions(
    State(state): State<TokensState>,
    Auth(auth): Auth,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = pagination.limit_offset()?;

    let sessions = state
        .db
        .sessions()
        .list_active_by_user(auth.user_id(), limit, offset)
        .await
        .internal_err("Failed to list sessions")?;

    Ok(Json(ListSessionsResponse { sessions }))
}
