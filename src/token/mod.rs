//! Authenticated-encrypted bearer tokens.
//!
//! Access tokens (short-lived) and refresh tokens (long-lived, backed by a
//! persisted session) share one format and one codec. The codec is built once
//! at startup from the symmetric key and handed to every component that needs it.

mod codec;
mod payload;

use chrono::Duration;

pub use codec::{KEY_LENGTH, TOKEN_HEADER, TokenCodec};
pub use payload::Payload;

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

/// Default refresh token lifetime: 1 week.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Configured token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDurations {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenDurations {
    fn default() -> Self {
        Self {
            access: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS as i64),
            refresh: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS as i64),
        }
    }
}

/// Why a token failed to decode. Only ever logged; callers see [`TokenError::Decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Wrong header, bad base64, truncated body or unparseable claims.
    Malformed,
    /// Ciphertext did not authenticate under this key.
    Authentication,
    /// The `exp` claim is not in the future.
    Expired,
    /// The `nbf` claim is in the future.
    NotYetValid,
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeFailure::Malformed => write!(f, "malformed token"),
            DecodeFailure::Authentication => write!(f, "authentication failed"),
            DecodeFailure::Expired => write!(f, "token has expired"),
            DecodeFailure::NotYetValid => write!(f, "token is not yet valid"),
        }
    }
}

/// Errors that can occur while minting or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("symmetric key must be exactly {expected} bytes, got {actual}")]
    KeyTooShort { expected: usize, actual: usize },
    #[error("failed to generate token identity: {0}")]
    IdentityGeneration(String),
    #[error("token duration out of range")]
    InvalidDuration,
    #[error("failed to encode token: {0}")]
    Encoding(String),
    #[error("invalid token: {0}")]
    Decode(DecodeFailure),
    #[error("invalid token")]
    InvalidToken,
}

impl TokenError {
    /// True for every error a client can cause by presenting a bad token.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, TokenError::Decode(_) | TokenError::InvalidToken)
    }
}
