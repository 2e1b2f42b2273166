//! Link API endpoints.
//!
//! Protected, mounted under `/api/links`:
//! - POST `/` - Create a link
//! - GET `/` - List the caller's links
//! - GET `/{id}` - Get one of the caller's links
//! - PATCH `/{id}` - Change a link's code
//! - PATCH `/{id}/toggle` - Activate or deactivate a link
//!
//! Public, mounted at the root:
//! - GET `/{code}` - Redirect to the link's target

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use super::error::{ApiError, ResultExt};
use super::pagination::Pagination;
use crate::auth::{Auth, protect};
use crate::codes::{MAX_CODE_LENGTH, generate_code, is_valid_code};
use crate::db::{Database, Link, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::token::TokenCodec;

/// Attempts at finding a free generated code before giving up.
const GENERATE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct LinksState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub client_ip_header: Option<String>,
}

impl_has_auth_backend!(LinksState);

pub fn router(state: LinksState) -> Router {
    protect(
        Router::new()
            .route("/", get(list_links).post(create_link))
            .route("/{id}", get(get_link).patch(update_link))
            .route("/{id}/toggle", patch(toggle_link)),
        state.clone(),
    )
    .with_state(state)
}

/// Public short-code redirects. Not authenticated.
pub fn redirect_router(state: LinksState) -> Router {
    Router::new()
        .route("/{code}", get(follow_link))
        .with_state(state)
}

fn validate_code(code: &str) -> Result<(), ApiError> {
    if !is_valid_code(code) {
        return Err(ApiError::bad_request(format!(
            "code must be 1 to {MAX_CODE_LENGTH} letters"
        )));
    }
    Ok(())
}

fn validate_target(link: &str) -> Result<(), ApiError> {
    match Url::parse(link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ApiError::bad_request("link must be an absolute http(s) URL")),
    }
}

/// Fetch a link and check the caller owns it.
async fn owned_link(state: &LinksState, id: i64, user_id: i64) -> Result<Link, ApiError> {
    let link = state
        .db
        .links()
        .get_by_id(id)
        .await
        .internal_err("Failed to get link")?
        .ok_or_else(|| ApiError::not_found("link not found"))?;

    if link.user_id != user_id {
        return Err(ApiError::forbidden("link doesn't belong to the authenticated user"));
    }

    Ok(link)
}

#[derive(Deserialize)]
struct CreateLinkRequest {
    link: String,
    code: Option<String>,
}

async fn create_link(
    State(state): State<LinksState>,
    Auth(auth): Auth,
    body: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    let target = payload.link.trim();
    validate_target(target)?;

    let link = match payload.code {
        Some(code) => {
            validate_code(&code)?;
            match state.db.links().create(auth.user_id(), &code, target).await {
                Ok(link) => link,
                Err(e) if is_unique_violation(&e) => {
                    return Err(ApiError::conflict("code is already taken"));
                }
                Err(e) => return Err(ApiError::internal("Failed to create link", e)),
            }
        }
        None => create_with_generated_code(&state, auth.user_id(), target).await?,
    };

    tracing::info!(user_id = auth.user_id(), link_id = link.id, "Link created");

    Ok((StatusCode::CREATED, Json(link)))
}

async fn create_with_generated_code(
    state: &LinksState,
    user_id: i64,
    target: &str,
) -> Result<Link, ApiError> {
    for _ in 0..GENERATE_ATTEMPTS {
        let code = generate_code();
        match state.db.links().create(user_id, &code, target).await {
            Ok(link) => return Ok(link),
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(ApiError::internal("Failed to create link", e)),
        }
    }
    Err(ApiError::internal(
        "Failed to create link",
        "no free code after retries",
    ))
}

#[derive(Serialize)]
struct ListLinksResponse {
    links: Vec<Link>,
}

async fn list_links(
    State(state): State<LinksState>,
    Auth(auth): Auth,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = pagination.limit_offset()?;

    let links = state
        .db
        .links()
        .list_by_user(auth.user_id(), limit, offset)
        .await
        .internal_err("Failed to list links")?;

    Ok(Json(ListLinksResponse { links }))
}

async fn get_link(
    State(state): State<LinksState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let link = owned_link(&state, id, auth.user_id()).await?;
    Ok(Json(link))
}

#[derive(Deserialize)]
struct UpdateLinkRequest {
    code: String,
}

async fn update_link(
    State(state): State<LinksState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    body: Result<Json<UpdateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    validate_code(&payload.code)?;
    owned_link(&state, id, auth.user_id()).await?;

    let link = match state.db.links().update_code(id, &payload.code).await {
        Ok(Some(link)) => link,
        Ok(None) => return Err(ApiError::not_found("link not found")),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("code is already taken"));
        }
        Err(e) => return Err(ApiError::internal("Failed to update link", e)),
    };

    Ok(Json(link))
}

async fn toggle_link(
    State(state): State<LinksState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    owned_link(&state, id, auth.user_id()).await?;

    let link = state
        .db
        .links()
        .toggle_active(id)
        .await
        .internal_err("Failed to toggle link")?
        .ok_or_else(|| ApiError::not_found("link not found"))?;

    Ok(Json(link))
}

async fn follow_link(
    State(state): State<LinksState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_code(&code)?;

    let link = state
        .db
        .links()
        .get_by_code(&code)
        .await
        .internal_err("Failed to get link")?
        .filter(|link| link.active)
        .ok_or_else(|| ApiError::not_found("link not found"))?;

    Ok(Redirect::permanent(&link.link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_target() {
        assert!(validate_target("https://example.com/a?b=c").is_ok());
        assert!(validate_target("http://localhost:8080").is_ok());
        assert!(validate_target("example.com").is_err());
        assert!(validate_target("/relative").is_err());
        assert!(validate_target("javascript:alert(1)").is_err());
    }
}
