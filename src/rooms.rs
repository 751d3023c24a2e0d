//! Chat room lifecycle and message fan-out.
//!
//! Rooms come in two shapes: direct rooms keyed by the deterministic
//! `room_<min>_<max>` name, and group rooms keyed by display name. The
//! router owns lifecycle rules and the two chat fan-outs driven by
//! inbound session events: latest-message relay and read receipts.
//!
//! `message_sent` is a signal, not a payload. The sender persists its
//! message over REST first, then pokes the room; everyone (including the
//! sender) receives the room's latest message from the store. That keeps
//! the store authoritative and makes the relay safe to re-run.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    ChatRoom, GroupSenderInfo, LatestMessagePayload, MessageId, PushEvent, RoomId, UserId,
};
use crate::registry::GroupRegistry;
use crate::store::{LeaveOutcome, Store, StoreError};
use crate::unread::UnreadCounter;

/// Group key for a direct room's chat channel
pub fn direct_chat_group(room_name: &str) -> String {
    format!("chat_{room_name}")
}

/// Group key for a group room's chat channel
pub fn group_chat_group(room_id: RoomId) -> String {
    format!("group_chat_{room_id}")
}

/// Chat group key for any room; None for a direct room missing its name
pub fn chat_group_for(room: &ChatRoom) -> Option<String> {
    if room.is_group {
        Some(group_chat_group(room.id))
    } else {
        room.room_name.as_deref().map(direct_chat_group)
    }
}

/// Room lifecycle errors
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("a direct room needs exactly two distinct participants")]
    InvalidParticipants,

    #[error("group name must not be empty")]
    InvalidGroupName,

    #[error("user not found")]
    UserNotFound,

    #[error("group not found")]
    GroupNotFound,
}

/// Owns room lifecycle and chat fan-out
#[derive(Clone)]
pub struct ChatRoomRouter {
    store: Store,
    registry: GroupRegistry,
    unread: UnreadCounter,
}

impl ChatRoomRouter {
    pub fn new(store: Store, registry: GroupRegistry, unread: UnreadCounter) -> Self {
        Self {
            store,
            registry,
            unread,
        }
    }

    /// Get or create the direct room between the requester and one peer.
    ///
    /// The requester is added to the participant list if absent; exactly
    /// two distinct participants must remain.
    pub fn create_direct(
        &self,
        requester: UserId,
        mut participants: Vec<UserId>,
    ) -> Result<ChatRoom, RoomError> {
        if !participants.contains(&requester) {
            participants.push(requester);
        }
        if participants.len() != 2 {
            return Err(RoomError::InvalidParticipants);
        }
        let other = participants
            .iter()
            .copied()
            .find(|id| *id != requester)
            .ok_or(RoomError::InvalidParticipants)?;
        if self.store.user(other).is_none() {
            return Err(RoomError::UserNotFound);
        }
        Ok(self.store.get_or_create_direct_room(requester, other))
    }

    /// Get or create a group room; repeat creation replaces the member
    /// set with the submitted one (requester always included).
    pub fn create_group(
        &self,
        requester: UserId,
        group_name: &str,
        participants: Vec<UserId>,
    ) -> Result<ChatRoom, RoomError> {
        if group_name.trim().is_empty() {
            return Err(RoomError::InvalidGroupName);
        }
        let mut members: HashSet<UserId> = participants.into_iter().collect();
        members.insert(requester);
        for id in &members {
            if self.store.user(*id).is_none() {
                return Err(RoomError::UserNotFound);
            }
        }
        Ok(self.store.create_group_room(group_name, members))
    }

    /// Remove a member from a group; the last leaver dissolves the room
    pub fn leave_group(&self, room_id: RoomId, user_id: UserId) -> Result<LeaveOutcome, RoomError> {
        match self.store.leave_group(room_id, user_id) {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::RoomNotFound) => Err(RoomError::GroupNotFound),
            Err(_) => Err(RoomError::GroupNotFound),
        }
    }

    /// Handle a `message_sent` signal: relay the latest message, then
    /// refresh everyone's unread counts.
    pub fn message_sent(&self, room: &ChatRoom) {
        self.relay_latest(room);
        self.unread.push_all();
    }

    /// Handle a `message_read` receipt: record the reader idempotently,
    /// fan out the updated read set, then refresh unread counts. An
    /// unknown message id is logged and skipped without an event.
    pub fn message_read(&self, room: &ChatRoom, message_id: MessageId, reader: UserId) {
        let updated = match self.store.mark_read(message_id, reader) {
            Some(msg) => msg,
            None => {
                warn!(message_id, "Read receipt for unknown message, skipping");
                return;
            }
        };

        if let Some(group) = chat_group_for(room) {
            self.registry.broadcast(
                &group,
                &PushEvent::MessageRead {
                    message_id: updated.id,
                    read_by: updated.read_by_list(),
                    timestamp: updated.timestamp,
                },
            );
        }
        self.unread.push_all();
    }

    fn relay_latest(&self, room: &ChatRoom) {
        let group = match chat_group_for(room) {
            Some(group) => group,
            None => return,
        };
        let latest = match self.store.latest_message(room.id) {
            Some(msg) => msg,
            None => {
                debug!(room_id = room.id, "No messages in room, skipping relay");
                return;
            }
        };

        // Group rooms carry sender display fields the frontend shows inline
        let group_sender = if room.is_group {
            self.store.user(latest.sender).map(|user| GroupSenderInfo {
                sender_username: user.username,
                sender_profile_pic: user.profile_pic,
            })
        } else {
            None
        };

        let payload = LatestMessagePayload {
            message: latest.message.clone(),
            file: latest.file.clone(),
            message_type: latest.message_type,
            sender: latest.sender,
            timestamp: latest.timestamp,
            read_by: latest.read_by_list(),
            message_id: latest.id,
            group_sender,
        };
        let delivered = self.registry.broadcast(&group, &payload);
        debug!(
            room_id = room.id,
            message_id = latest.id,
            delivered,
            "Relayed latest message"
        );
    }
}
