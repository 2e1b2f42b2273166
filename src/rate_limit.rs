//! Rate limiting for signup and login.
//!
//! Token bucket per client IP, to slow down password guessing and account spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket shared by every request whose IP cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for user creation
    pub user_create: Arc<IpLimiter>,
    client_ip_header: Option<String>,
}

impl RateLimitConfig {
    /// Allow `per_minute` requests per IP to each endpoint. Zero is treated as one.
    pub fn new(per_minute: u32, client_ip_header: Option<String>) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            login: Arc::new(RateLimiter::keyed(quota)),
            user_create: Arc::new(RateLimiter::keyed(quota)),
            client_ip_header,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        extract_client_ip(request, self.client_ip_header.as_deref())
            .unwrap_or_else(|_| UNKNOWN_CLIENT.to_string())
    }
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Login rate limit exceeded");
            ApiError::too_many_requests("too many login attempts, please wait before trying again")
                .into_response()
        }
    }
}

/// Middleware for rate limiting user creation.
pub async fn rate_limit_user_create(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.user_create.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Signup rate limit exceeded");
            ApiError::too_many_requests("too many signup attempts, please wait before trying again")
                .into_response()
        }
    }
}
