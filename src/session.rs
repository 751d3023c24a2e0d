//! Per-connection WebSocket session lifecycle.
//!
//! Every accepted socket runs the same skeleton: join the variant's
//! groups, mark presence when the variant calls for it, split the socket
//! into a writer task (outbound queue + keepalive pings) and a read loop,
//! then tear everything down when the peer goes away. What differs per
//! variant is only which groups it sits in and which inbound frames it
//! understands; receive-only variants ignore inbound text entirely.
//!
//! Teardown is idempotent from the registry's point of view: a session
//! that never managed to join still leaves cleanly.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::calls::{user_call_group, video_call_group};
use crate::handlers::AppState;
use crate::models::{ChatEvent, RoomId, SignalEvent, User, UserId};
use crate::notify::{ADMIN_ANNOUNCEMENT_GROUP, FEED_GROUP};
use crate::registry::ConnectionHandle;
use crate::rooms::{direct_chat_group, group_chat_group};
use crate::unread::user_notifications_group;

/// What a connection is for: which groups it joins, whether it flips
/// presence, and which inbound frames it understands
#[derive(Debug, Clone)]
pub enum SessionVariant {
    /// Two-party chat, keyed by room name
    DirectChat { room_name: String },

    /// Group chat, keyed by room id
    GroupChat { room_id: RoomId },

    /// Receive-only: unread counts, notifications, announcements, feed
    Notifications,

    /// WebRTC signaling between the session user and one peer
    VideoCall { peer: UserId },

    /// Receive-only call lifecycle notifications
    CallNotifications,
}

impl SessionVariant {
    /// Group keys this session joins on connect and leaves on disconnect
    pub fn groups(&self, user_id: UserId) -> Vec<String> {
        match self {
            Self::DirectChat { room_name } => vec![direct_chat_group(room_name)],
            Self::GroupChat { room_id } => vec![group_chat_group(*room_id)],
            Self::Notifications => vec![
                user_notifications_group(user_id),
                ADMIN_ANNOUNCEMENT_GROUP.to_string(),
                FEED_GROUP.to_string(),
            ],
            Self::VideoCall { peer } => vec![video_call_group(user_id, *peer)],
            Self::CallNotifications => vec![user_call_group(user_id)],
        }
    }

    /// Chat sessions mark the user online for their duration
    pub fn marks_presence(&self) -> bool {
        matches!(self, Self::DirectChat { .. } | Self::GroupChat { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::DirectChat { .. } => "chat",
            Self::GroupChat { .. } => "groupchat",
            Self::Notifications => "unreadnotifications",
            Self::VideoCall { .. } => "video_call",
            Self::CallNotifications => "call",
        }
    }
}

/// An authenticated, accepted WebSocket connection
pub struct ConnectionSession {
    state: AppState,
    user: User,
    variant: SessionVariant,
}

impl ConnectionSession {
    pub fn new(state: AppState, user: User, variant: SessionVariant) -> Self {
        Self {
            state,
            user,
            variant,
        }
    }

    /// Drive the connection until the peer goes away or the socket errors
    pub async fn run(self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Arc<String>>(self.state.config.send_queue_capacity);

        let handle = ConnectionHandle::new(self.user.id, tx);
        let groups = self.variant.groups(self.user.id);
        for group in &groups {
            self.state.registry.join(group, handle.clone());
        }
        if self.variant.marks_presence() {
            self.state.store.set_online(self.user.id, true);
        }
        info!(
            session = self.variant.label(),
            user_id = self.user.id,
            connection_id = %handle.id,
            "Session opened"
        );

        // Writer task: drain the outbound queue and keep the socket alive
        // with periodic pings. It dies with the rx when the session drops
        // its groups, or earlier if the sink errors.
        let ping_interval = self.state.config.ping_interval;
        let writer = tokio::spawn(async move {
            let mut ping_ticker = tokio::time::interval(ping_interval);
            ping_ticker.tick().await; // skip the immediate first tick
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(payload) => {
                            if sink.send(Message::Text(payload.as_ref().clone())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ping_ticker.tick() => {
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if text.len() > self.state.config.max_event_bytes {
                        warn!(
                            session = self.variant.label(),
                            user_id = self.user.id,
                            bytes = text.len(),
                            "Dropping oversized frame"
                        );
                        continue;
                    }
                    self.handle_frame(&text);
                }
                Ok(Message::Close(_)) => break,
                // axum answers pings itself; pongs and binary are ignored
                Ok(_) => {}
                Err(err) => {
                    debug!(user_id = self.user.id, error = %err, "Socket error, closing");
                    break;
                }
            }
        }

        for group in &groups {
            self.state.registry.leave(group, handle.id);
        }
        if self.variant.marks_presence() {
            self.state.store.set_online(self.user.id, false);
        }
        writer.abort();
        info!(
            session = self.variant.label(),
            user_id = self.user.id,
            connection_id = %handle.id,
            "Session closed"
        );
    }

    /// Dispatch one inbound text frame.
    ///
    /// Malformed frames and frames referencing rooms that no longer
    /// exist are logged and skipped; fan-out never errors back over the
    /// socket.
    fn handle_frame(&self, text: &str) {
        match &self.variant {
            SessionVariant::DirectChat { room_name } => {
                let event: ChatEvent = match serde_json::from_str(text) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(user_id = self.user.id, error = %err, "Malformed chat frame");
                        return;
                    }
                };
                let room = match self.state.store.room_by_name(room_name) {
                    Some(room) => room,
                    None => {
                        warn!(room_name, "Chat frame for unknown room, skipping");
                        return;
                    }
                };
                self.dispatch_chat(event, &room);
            }
            SessionVariant::GroupChat { room_id } => {
                let event: ChatEvent = match serde_json::from_str(text) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(user_id = self.user.id, error = %err, "Malformed chat frame");
                        return;
                    }
                };
                let room = match self.state.store.room(*room_id) {
                    Some(room) => room,
                    None => {
                        warn!(room_id, "Chat frame for unknown room, skipping");
                        return;
                    }
                };
                self.dispatch_chat(event, &room);
            }
            SessionVariant::VideoCall { peer } => {
                let event: SignalEvent = match serde_json::from_str(text) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(user_id = self.user.id, error = %err, "Malformed signaling frame");
                        return;
                    }
                };
                self.state
                    .calls
                    .relay(&video_call_group(self.user.id, *peer), event);
            }
            SessionVariant::Notifications | SessionVariant::CallNotifications => {
                debug!(
                    session = self.variant.label(),
                    user_id = self.user.id,
                    "Ignoring inbound frame on receive-only session"
                );
            }
        }
    }

    fn dispatch_chat(&self, event: ChatEvent, room: &crate::models::ChatRoom) {
        match event {
            // The frame's message_id is advisory; the relay always picks
            // up the room's latest persisted message
            ChatEvent::MessageSent { .. } => self.state.rooms.message_sent(room),
            ChatEvent::MessageRead {
                message_id,
                user_id,
            } => self.state.rooms.message_read(room, message_id, user_id),
        }
    }
}
