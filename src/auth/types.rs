//! Authentication user types.

use crate::token::Payload;

/// Identity attached to a request once its bearer token has been verified.
///
/// Only the `authenticate` middleware inserts this into the request
/// extensions; routes outside the protected chain never see one.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Decoded access token payload
    pub payload: Payload,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.payload.subject_id
    }
}
