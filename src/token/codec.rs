//! Token sealing and verification.
//!
//! A token is `v1.local.` followed by unpadded base64url of
//! `nonce || ciphertext || tag`, produced by AES-256-GCM with the header as
//! associated data. The plaintext is a JSON claim set carrying the registered
//! `exp`/`iat`/`nbf`/`sub` claims next to the sealed [`Payload`].

use aes_gcm::aead::{Aead, KeyInit, Payload as AeadInput};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::{DecodeFailure, Payload, TokenError};

/// Required symmetric key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Version and purpose prefix of every token.
pub const TOKEN_HEADER: &str = "v1.local.";

const NONCE_LENGTH: usize = 12;

/// Claim set as sealed on encode.
#[derive(Serialize)]
struct SealedClaims<'a> {
    exp: DateTime<Utc>,
    iat: DateTime<Utc>,
    nbf: DateTime<Utc>,
    sub: String,
    payload: &'a Payload,
}

/// Claim set as read on decode. `payload` is extracted in a second step so a
/// verified envelope without a usable payload can be told apart.
#[derive(Deserialize)]
struct OpenedClaims {
    exp: DateTime<Utc>,
    nbf: DateTime<Utc>,
    sub: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// Encodes and decodes tokens under a single symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    /// Create a codec. Fails unless `key` is exactly [`KEY_LENGTH`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        if key.len() != KEY_LENGTH {
            return Err(TokenError::KeyTooShort {
                expected: KEY_LENGTH,
                actual: key.len(),
            });
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| TokenError::KeyTooShort {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;

        Ok(Self { cipher })
    }

    /// Mint a new token for `subject_id` valid for `duration`.
    pub fn issue(
        &self,
        subject_id: i64,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(subject_id, duration)?;
        let token = self.encode(&payload)?;
        Ok((token, payload))
    }

    /// Seal `payload` into a token. Every call uses a fresh nonce.
    pub fn encode(&self, payload: &Payload) -> Result<String, TokenError> {
        let claims = SealedClaims {
            exp: payload.expires_at,
            iat: payload.issued_at,
            nbf: Utc::now(),
            sub: payload.subject_id.to_string(),
            payload,
        };

        let plaintext =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        self.seal(&plaintext)
    }

    /// Verify `token` and return the payload it carries.
    pub fn decode(&self, token: &str) -> Result<Payload, TokenError> {
        let plaintext = self.open(token)?;

        let claims: OpenedClaims = serde_json::from_slice(&plaintext)
            .map_err(|_| TokenError::Decode(DecodeFailure::Malformed))?;

        let now = Utc::now();
        if claims.exp <= now {
            return Err(TokenError::Decode(DecodeFailure::Expired));
        }
        if claims.nbf > now {
            return Err(TokenError::Decode(DecodeFailure::NotYetValid));
        }

        let payload: Payload = claims
            .payload
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or(TokenError::InvalidToken)?;

        if claims.sub != payload.subject_id.to_string() {
            return Err(TokenError::InvalidToken);
        }

        Ok(payload)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                AeadInput {
                    msg: plaintext,
                    aad: TOKEN_HEADER.as_bytes(),
                },
            )
            .map_err(|_| TokenError::Encoding("encryption failed".to_string()))?;

        let mut body = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        body.extend_from_slice(&nonce_bytes);
        body.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", TOKEN_HEADER, URL_SAFE_NO_PAD.encode(body)))
    }

    fn open(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let body = token
            .strip_prefix(TOKEN_HEADER)
            .ok_or(TokenError::Decode(DecodeFailure::Malformed))?;

        let raw = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| TokenError::Decode(DecodeFailure::Malformed))?;

        if raw.len() <= NONCE_LENGTH {
            return Err(TokenError::Decode(DecodeFailure::Malformed));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LENGTH);

        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                AeadInput {
                    msg: ciphertext,
                    aad: TOKEN_HEADER.as_bytes(),
                },
            )
            .map_err(|_| TokenError::Decode(DecodeFailure::Authentication))
    }
}
