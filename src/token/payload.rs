use chrono::{DateTime, Duration, Utc};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Claims sealed inside every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Random token id. For refresh tokens this is also the session id.
    pub id: Uuid,
    /// Authenticated user.
    pub subject_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    /// Build a fresh payload for `subject_id` valid for `duration`.
    ///
    /// The sign of `duration` is not checked: a zero or negative duration
    /// yields a payload that is already expired.
    pub fn new(subject_id: i64, duration: Duration) -> Result<Self, TokenError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::IdentityGeneration(e.to_string()))?;
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();

        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(duration)
            .ok_or(TokenError::InvalidDuration)?;

        Ok(Self {
            id,
            subject_id,
            issued_at,
            expires_at,
        })
    }
}
