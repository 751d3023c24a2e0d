//! Configuration for the Pulse realtime gateway.
//!
//! In-memory fan-out design - the process owns all live connection and
//! room state. All configuration is loaded from environment variables.
//! No secrets are logged.

use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// HMAC secret for bearer token validation
    pub auth_secret: String,

    // === Fan-out tuning ===
    /// Outbound event buffer per connection (events, not bytes)
    pub send_queue_capacity: usize,

    /// Keepalive ping interval for WebSocket sessions
    pub ping_interval: Duration,

    // === Limits ===
    /// Maximum accepted inbound WebSocket frame size in bytes
    pub max_event_bytes: usize,

    /// Page size for the older-messages history endpoint
    pub history_page_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            auth_secret: std::env::var("AUTH_SECRET")
                .unwrap_or_else(|_| "pulse-dev-secret".to_string()),

            // Fan-out tuning
            send_queue_capacity: std::env::var("SEND_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64),
            ping_interval: Duration::from_secs(
                std::env::var("PING_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),

            // Limits
            max_event_bytes: std::env::var("MAX_EVENT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16 * 1024), // 16KB
            history_page_size: std::env::var("HISTORY_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
