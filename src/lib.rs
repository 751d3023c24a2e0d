//! # Pulse Backend
//!
//! Realtime fan-out gateway for a social app: chat rooms, read receipts,
//! unread counters, call signaling and notification push.
//!
//! ## Design Principles
//!
//! - **Store-authoritative relay**: messages persist over REST; sessions
//!   only signal, and everyone receives the store's latest row
//! - **Best-effort delivery**: fan-out never blocks or fails a mutation;
//!   slow consumers drop events, dead consumers are pruned
//! - **RAM-only state**: the app tier reseeds users and rooms on restart
//! - **Auth before upgrade**: every WebSocket variant validates its token
//!   before the handshake completes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  Client A   │────▶│   Gateway    │◀────│  Client B   │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                    ┌───────┴────────┐
//!                    │                │
//!               In-Memory        GroupRegistry
//!                 Store          (live sockets)
//! ```
//!
//! ## API Overview
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/health` | GET | Health check |
//! | `/api/users` | POST | Seed a user |
//! | `/api/chatrooms` | GET/POST | List rooms / direct room get-or-create |
//! | `/api/chatrooms/:room_id` | GET | Room detail |
//! | `/api/chatrooms/create-group` | POST | Group room get-or-create |
//! | `/api/chatrooms/user-groups` | GET | Caller's groups |
//! | `/api/chatrooms/:room_id/leave-group` | POST | Leave a group |
//! | `/api/messages/:room_name` | GET/POST | History / create message |
//! | `/api/messages/:room_name/older/:id` | GET | Older-history page |
//! | `/api/messages/list-with-id/:room_id` | GET | History by room id |
//! | `/api/messages/create-with-id` | POST | Create message by room id |
//! | `/api/unread_counts` | GET | Per-peer unread snapshot |
//! | `/api/initiate_call` | POST | Start a call |
//! | `/api/accept_call/:call_id` | POST | Accept a call |
//! | `/api/decline_call/:call_id` | POST | Decline a call |
//! | `/api/end_call/:call_id` | POST | End a call |
//! | `/api/notifications` | GET/POST | List / push a notification |
//! | `/api/announcements` | POST | Admin broadcast |
//! | `/api/feed` | POST | Feed-update broadcast |
//! | `/ws/chat/:room_name` | GET | Direct chat session |
//! | `/ws/groupchat/:room_id` | GET | Group chat session |
//! | `/ws/unreadnotifications/:user_id` | GET | Notification session |
//! | `/ws/video-call/:user_id/:caller_id` | GET | Signaling session |
//! | `/ws/call/:user_id` | GET | Call-notification session |

pub mod auth;
pub mod calls;
pub mod config;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod registry;
pub mod rooms;
pub mod session;
pub mod store;
pub mod unread;

pub use config::Config;
pub use handlers::AppState;
pub use registry::GroupRegistry;
pub use store::Store;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Maximum request body size (64 KiB).
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check (unauthenticated)
        .route("/api/health", get(handlers::health))
        // User seeding (dev/test)
        .route("/api/users", post(handlers::create_user))
        // Chat rooms
        .route(
            "/api/chatrooms",
            get(handlers::list_rooms).post(handlers::create_room),
        )
        .route("/api/chatrooms/create-group", post(handlers::create_group))
        .route("/api/chatrooms/user-groups", get(handlers::user_groups))
        .route("/api/chatrooms/:room_id", get(handlers::room_detail))
        .route(
            "/api/chatrooms/:room_id/leave-group",
            post(handlers::leave_group),
        )
        // Messages
        .route(
            "/api/messages/create-with-id",
            post(handlers::create_message_by_id),
        )
        .route(
            "/api/messages/list-with-id/:room_id",
            get(handlers::room_messages_by_id),
        )
        .route(
            "/api/messages/:room_name",
            get(handlers::room_messages).post(handlers::create_message),
        )
        .route(
            "/api/messages/:room_name/older/:oldest_message_id",
            get(handlers::older_messages),
        )
        // Unread counts
        .route("/api/unread_counts", get(handlers::unread_counts))
        // Calls
        .route("/api/initiate_call", post(handlers::initiate_call))
        .route("/api/accept_call/:call_id", post(handlers::accept_call))
        .route("/api/decline_call/:call_id", post(handlers::decline_call))
        .route("/api/end_call/:call_id", post(handlers::end_call))
        // Notifications
        .route(
            "/api/notifications",
            get(handlers::list_notifications).post(handlers::create_notification),
        )
        .route("/api/announcements", post(handlers::create_announcement))
        .route("/api/feed", post(handlers::feed_update))
        // WebSocket sessions
        .route("/ws/chat/:room_name", get(handlers::ws_chat))
        .route("/ws/groupchat/:room_id", get(handlers::ws_groupchat))
        .route(
            "/ws/unreadnotifications/:user_id",
            get(handlers::ws_notifications),
        )
        .route(
            "/ws/video-call/:user_id/:caller_id",
            get(handlers::ws_video_call),
        )
        .route("/ws/call/:user_id", get(handlers::ws_call))
        // Middleware stack (order matters: first added = outermost)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
