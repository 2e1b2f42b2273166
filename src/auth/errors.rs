//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request was refused by the authentication chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No `Authorization` header.
    MissingHeader,
    /// Header is not exactly `<scheme> <credentials>`.
    MalformedHeader,
    /// Scheme is not `bearer`.
    UnsupportedScheme,
    /// Token failed to decode.
    InvalidToken,
    /// Token is valid but its subject no longer resolves to a user.
    IdentityUnresolvable,
}

/// API authentication error. Always 401 with a JSON body.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::MissingHeader => "authorization header is empty",
            AuthErrorKind::MalformedHeader => "authorization header is invalid",
            AuthErrorKind::UnsupportedScheme => "authorization type is invalid",
            // A deleted user must look exactly like a bad token
            AuthErrorKind::InvalidToken | AuthErrorKind::IdentityUnresolvable => "invalid token",
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
