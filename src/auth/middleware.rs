//! Request authentication chain.
//!
//! `authenticate` verifies the bearer token without touching the database and
//! attaches an [`AuthenticatedUser`] to the request. `require_live_user` runs
//! after it and checks the subject still exists. Use [`protect`] to layer both
//! in the right order.

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;

const BEARER_SCHEME: &str = "bearer";

/// Pull the bearer credentials out of the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthErrorKind> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthErrorKind::MissingHeader)?
        .to_str()
        .map_err(|_| AuthErrorKind::MalformedHeader)?;

    if value.is_empty() {
        return Err(AuthErrorKind::MissingHeader);
    }

    let mut fields = value.split_whitespace();
    let (Some(scheme), Some(token), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(AuthErrorKind::MalformedHeader);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthErrorKind::UnsupportedScheme);
    }

    Ok(token)
}

/// Verify the bearer token and attach the caller's identity.
pub async fn authenticate<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(kind) => {
            tracing::debug!(reason = ?kind, "Rejected authorization header");
            return ApiAuthError::new(kind).into_response();
        }
    };

    let payload = match state.codec().decode(token) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return ApiAuthError::new(AuthErrorKind::InvalidToken).into_response();
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser { payload });

    next.run(request).await
}

/// Reject requests whose authenticated subject no longer exists.
///
/// Must run after [`authenticate`]. A missing identity, an unknown user and a
/// store failure all produce the same 401.
pub async fn require_live_user<S>(State(state): State<S>, request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let Some(user_id) = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(AuthenticatedUser::user_id)
    else {
        tracing::error!("Identity check ran without an authenticated user");
        return ApiAuthError::new(AuthErrorKind::IdentityUnresolvable).into_response();
    };

    match state.db().users().get_by_id(user_id).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => {
            tracing::debug!(user_id, "Token subject no longer exists");
            ApiAuthError::new(AuthErrorKind::IdentityUnresolvable).into_response()
        }
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to look up token subject");
            ApiAuthError::new(AuthErrorKind::IdentityUnresolvable).into_response()
        }
    }
}

/// Put every route of `router` behind [`authenticate`] followed by
/// [`require_live_user`].
pub fn protect<S>(router: Router<S>, state: S) -> Router<S>
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    // The layer added last runs first.
    router
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_live_user::<S>,
        ))
        .route_layer(middleware::from_fn_with_state(state, authenticate::<S>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers("BEARER abc")), Ok("abc"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthErrorKind::MissingHeader)
        );
        assert_eq!(bearer_token(&headers("")), Err(AuthErrorKind::MissingHeader));
    }

    #[test]
    fn test_wrong_field_count() {
        for value in ["Bearer", "abc", "Bearer abc def", " "] {
            assert_eq!(
                bearer_token(&headers(value)),
                Err(AuthErrorKind::MalformedHeader),
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn test_unsupported_scheme() {
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthErrorKind::UnsupportedScheme)
        );
    }
}
