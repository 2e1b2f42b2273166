use clap::Parser;
use shortlink::cli::{
    Args, build_config, handle_block_session, init_logging, load_token_key, open_database,
    token_durations,
};
use shortlink::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(session_id) = args.block_session {
        let blocked = handle_block_session(&db, session_id).await;
        std::process::exit(if blocked { 0 } else { 1 });
    }

    let Some(token_key) = load_token_key(args.token_key_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(durations) = token_durations(args.access_token_ttl, args.refresh_token_ttl) else {
        std::process::exit(1);
    };

    let config = build_config(
        db,
        token_key,
        durations,
        args.client_ip_header,
        args.auth_rate_per_minute,
    );
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to get local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
