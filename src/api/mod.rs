mod error;
mod links;
mod pagination;
mod tokens;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::token::{TokenCodec, TokenDurations};

pub use error::{ApiError, INTERNAL_ERROR_MESSAGE, ResultExt};
pub use links::LinksState;
pub use tokens::TokensState;
pub use users::{UserSummary, UsersState};

/// Create the API router, to be nested under `/api`.
pub fn create_api_router(
    db: Database,
    codec: Arc<TokenCodec>,
    durations: TokenDurations,
    client_ip_header: Option<String>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        codec: codec.clone(),
        client_ip_header: client_ip_header.clone(),
        durations,
        rate_limit_config,
    };

    let tokens_state = tokens::TokensState {
        db: db.clone(),
        codec: codec.clone(),
        client_ip_header: client_ip_header.clone(),
        durations,
    };

    let links_state = links::LinksState {
        db,
        codec,
        client_ip_header,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/tokens", tokens::router(tokens_state))
        .nest("/links", links::router(links_state))
}

/// Create the public short-code redirect router, mounted at the root.
pub fn create_redirect_router(db: Database, codec: Arc<TokenCodec>) -> Router {
    links::redirect_router(links::LinksState {
        db,
        codec,
        client_ip_header: None,
    })
}
