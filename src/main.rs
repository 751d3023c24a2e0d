//! Pulse Backend - Realtime Messaging Gateway
//!
//! An in-memory fan-out layer for a social app that:
//! - Relays chat messages and read receipts to room groups
//! - Pushes unread counters, notifications and announcements per user
//! - Carries WebRTC call signaling between two peers
//!
//! # Operational Properties
//!
//! - RAM-only state - the app tier reseeds users and rooms on restart
//! - Best-effort delivery - slow consumers drop events, dead ones are
//!   pruned
//! - Every WebSocket variant authenticates before the upgrade completes

use axum::Router;
use pulse_backend::{build_router, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load and validate configuration
    let config = Config::from_env();
    log_startup_info(&config);

    // Initialize core components and serve
    let state = AppState::new(config.clone());
    let app = build_router(state);
    serve(app, &config).await;
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pulse_backend=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        storage = "memory",
        send_queue_capacity = config.send_queue_capacity,
        ping_interval_secs = config.ping_interval.as_secs(),
        max_event_bytes = config.max_event_bytes,
        history_page_size = config.history_page_size,
        "Starting Pulse backend"
    );
}

/// Bind to address and serve the application.
async fn serve(app: Router, config: &Config) {
    let bind_addr = format!("{}:{}", config.bind_addr, config.port);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %bind_addr, "Server listening");

    axum::serve(listener, app).await.expect("Server error");
}
