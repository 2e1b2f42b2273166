pub mod api;
pub mod auth;
pub mod cli;
pub mod codes;
pub mod db;
pub mod password;
pub mod rate_limit;
pub mod token;

use api::{create_api_router, create_redirect_router};
use axum::Router;
use db::Database;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use token::{TokenCodec, TokenDurations, TokenError};
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Symmetric key for sealing tokens, exactly 32 bytes
    pub token_key: Vec<u8>,
    /// Access and refresh token lifetimes
    pub durations: TokenDurations,
    /// Trusted header carrying the client IP (requires running behind a proxy)
    pub client_ip_header: Option<String>,
    /// Signup and login attempts allowed per client IP per minute
    pub auth_rate_per_minute: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Create the application router with the given configuration.
///
/// Builds the one [`TokenCodec`] every component shares; fails if the key
/// has the wrong length.
pub fn create_app(config: &ServerConfig) -> Result<Router, TokenError> {
    let codec = Arc::new(TokenCodec::new(&config.token_key)?);

    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.auth_rate_per_minute,
        config.client_ip_header.clone(),
    ));

    let api_router = create_api_router(
        config.db.clone(),
        codec.clone(),
        config.durations,
        config.client_ip_header.clone(),
        rate_limit_config,
    );

    Ok(Router::new()
        .nest("/api", api_router)
        .merge(create_redirect_router(config.db.clone(), codec)))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), StartupError> {
    let app = create_app(&config)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await?;
    Ok(())
}
