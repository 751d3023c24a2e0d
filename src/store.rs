//! In-memory authoritative store for the realtime layer.
//!
//! Users, rooms, messages, calls and notifications live in sharded maps.
//! No persistence - the app tier reseeds this layer on restart.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::models::*;

/// Thread-safe in-memory store
#[derive(Clone)]
pub struct Store {
    /// Users by id
    users: Arc<DashMap<UserId, User>>,

    /// Unique username index
    users_by_name: Arc<DashMap<String, UserId>>,

    /// Rooms by id
    rooms: Arc<DashMap<RoomId, ChatRoom>>,

    /// Unique `room_name` index (direct rooms)
    rooms_by_name: Arc<DashMap<String, RoomId>>,

    /// Unique `group_name` index (group rooms)
    rooms_by_group: Arc<DashMap<String, RoomId>>,

    /// Messages by id
    messages: Arc<DashMap<MessageId, Message>>,

    /// Message ids per room in append order (equal to id order)
    room_messages: Arc<DashMap<RoomId, Vec<MessageId>>>,

    /// Call requests by id
    calls: Arc<DashMap<CallId, CallRequest>>,

    /// Notifications by id
    notifications: Arc<DashMap<NotificationId, Notification>>,

    user_seq: Arc<AtomicU64>,
    room_seq: Arc<AtomicU64>,
    message_seq: Arc<AtomicU64>,
    call_seq: Arc<AtomicU64>,
    notification_seq: Arc<AtomicU64>,
}

/// Outcome of leaving a group room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Member removed, room still has participants
    Left,
    /// Last member removed, room deleted
    Dissolved,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            users_by_name: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            rooms_by_name: Arc::new(DashMap::new()),
            rooms_by_group: Arc::new(DashMap::new()),
            messages: Arc::new(DashMap::new()),
            room_messages: Arc::new(DashMap::new()),
            calls: Arc::new(DashMap::new()),
            notifications: Arc::new(DashMap::new()),
            user_seq: Arc::new(AtomicU64::new(0)),
            room_seq: Arc::new(AtomicU64::new(0)),
            message_seq: Arc::new(AtomicU64::new(0)),
            call_seq: Arc::new(AtomicU64::new(0)),
            notification_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    // === Users ===

    /// Create a user with a unique username
    pub fn create_user(
        &self,
        username: &str,
        profile_pic: Option<String>,
    ) -> Result<User, StoreError> {
        match self.users_by_name.entry(username.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::UsernameTaken),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let id = self.user_seq.fetch_add(1, Ordering::Relaxed) + 1;
                let user = User {
                    id,
                    username: username.to_string(),
                    profile_pic,
                    is_online: false,
                    created_at: Utc::now(),
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                debug!(user_id = id, "Created user");
                Ok(user)
            }
        }
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn username(&self, id: UserId) -> Option<String> {
        self.users.get(&id).map(|entry| entry.username.clone())
    }

    /// All known user ids, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Flip the presence flag; returns false for an unknown user
    pub fn set_online(&self, id: UserId, online: bool) -> bool {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.is_online = online;
                true
            }
            None => false,
        }
    }

    // === Rooms ===

    /// Get or create the direct room between two users.
    ///
    /// Keyed by the deterministic `room_<min>_<max>` name, so repeat calls
    /// (in either argument order) converge on one room. Both users are
    /// added to the participant set idempotently.
    pub fn get_or_create_direct_room(&self, a: UserId, b: UserId) -> ChatRoom {
        let name = direct_room_name(a, b);
        let room_id = *self.rooms_by_name.entry(name.clone()).or_insert_with(|| {
            let id = self.room_seq.fetch_add(1, Ordering::Relaxed) + 1;
            let room = ChatRoom {
                id,
                room_name: Some(name.clone()),
                group_name: None,
                is_group: false,
                participants: HashSet::new(),
            };
            self.rooms.insert(id, room);
            debug!(room_id = id, room_name = %name, "Created direct room");
            id
        });

        let mut room = self.rooms.entry(room_id).or_insert_with(|| ChatRoom {
            id: room_id,
            room_name: Some(name),
            group_name: None,
            is_group: false,
            participants: HashSet::new(),
        });
        room.participants.insert(a);
        room.participants.insert(b);
        room.clone()
    }

    /// Get or create a group room by name.
    ///
    /// Repeat creation replaces the participant set with the submitted one.
    pub fn create_group_room(&self, group_name: &str, participants: HashSet<UserId>) -> ChatRoom {
        let room_id = *self
            .rooms_by_group
            .entry(group_name.to_string())
            .or_insert_with(|| {
                let id = self.room_seq.fetch_add(1, Ordering::Relaxed) + 1;
                let room = ChatRoom {
                    id,
                    room_name: None,
                    group_name: Some(group_name.to_string()),
                    is_group: true,
                    participants: HashSet::new(),
                };
                self.rooms.insert(id, room);
                debug!(room_id = id, group_name, "Created group room");
                id
            });

        let mut room = self.rooms.entry(room_id).or_insert_with(|| ChatRoom {
            id: room_id,
            room_name: None,
            group_name: Some(group_name.to_string()),
            is_group: true,
            participants: HashSet::new(),
        });
        room.participants = participants;
        room.clone()
    }

    pub fn room(&self, id: RoomId) -> Option<ChatRoom> {
        self.rooms.get(&id).map(|entry| entry.value().clone())
    }

    pub fn room_by_name(&self, room_name: &str) -> Option<ChatRoom> {
        let room_id = *self.rooms_by_name.get(room_name)?;
        self.room(room_id)
    }

    /// Rooms the user participates in, ascending by id
    pub fn rooms_for_user(&self, user_id: UserId) -> Vec<ChatRoom> {
        let mut rooms: Vec<ChatRoom> = self
            .rooms
            .iter()
            .filter(|entry| entry.participants.contains(&user_id))
            .map(|entry| entry.value().clone())
            .collect();
        rooms.sort_unstable_by_key(|room| room.id);
        rooms
    }

    /// Group rooms the user participates in, ascending by id
    pub fn groups_for_user(&self, user_id: UserId) -> Vec<ChatRoom> {
        let mut groups: Vec<ChatRoom> = self
            .rooms
            .iter()
            .filter(|entry| entry.is_group && entry.participants.contains(&user_id))
            .map(|entry| entry.value().clone())
            .collect();
        groups.sort_unstable_by_key(|room| room.id);
        groups
    }

    /// Remove a member from a group room, deleting the room (and its
    /// messages) once the participant set empties.
    pub fn leave_group(&self, room_id: RoomId, user_id: UserId) -> Result<LeaveOutcome, StoreError> {
        let (group_name, emptied) = {
            let mut room = match self.rooms.get_mut(&room_id) {
                Some(room) if room.is_group => room,
                _ => return Err(StoreError::RoomNotFound),
            };
            room.participants.remove(&user_id);
            (room.group_name.clone(), room.participants.is_empty())
        };

        if !emptied {
            return Ok(LeaveOutcome::Left);
        }

        self.rooms.remove(&room_id);
        if let Some(name) = group_name {
            self.rooms_by_group.remove(&name);
        }
        if let Some((_, ids)) = self.room_messages.remove(&room_id) {
            for id in ids {
                self.messages.remove(&id);
            }
        }
        debug!(room_id, "Dissolved empty group room");
        Ok(LeaveOutcome::Dissolved)
    }

    // === Messages ===

    /// Persist a message in a room.
    ///
    /// The id is allocated under the room's append lock, so id order and
    /// append order agree; that order is the room's timeline.
    pub fn create_message(
        &self,
        room_id: RoomId,
        sender: UserId,
        message: Option<String>,
        file: Option<String>,
        message_type: MessageType,
    ) -> Result<Message, StoreError> {
        if !self.rooms.contains_key(&room_id) {
            return Err(StoreError::RoomNotFound);
        }

        let mut ids = self.room_messages.entry(room_id).or_default();
        let id = self.message_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = Message {
            id,
            room_id,
            sender,
            message,
            file,
            message_type,
            timestamp: Utc::now(),
            read_by: std::collections::BTreeSet::new(),
        };
        self.messages.insert(id, msg.clone());
        ids.push(id);
        debug!(message_id = id, room_id, "Stored message");
        Ok(msg)
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.messages.get(&id).map(|entry| entry.value().clone())
    }

    /// Add a reader to a message's read set (idempotent); returns the
    /// updated message, or None for an unknown id.
    pub fn mark_read(&self, message_id: MessageId, reader: UserId) -> Option<Message> {
        let mut msg = self.messages.get_mut(&message_id)?;
        msg.read_by.insert(reader);
        Some(msg.clone())
    }

    /// The newest message in a room, if any
    pub fn latest_message(&self, room_id: RoomId) -> Option<Message> {
        let ids = self.room_messages.get(&room_id)?;
        let last = *ids.last()?;
        drop(ids);
        self.message(last)
    }

    /// Full history of a room in timeline order
    pub fn room_history(&self, room_id: RoomId) -> Vec<Message> {
        let ids: Vec<MessageId> = self
            .room_messages
            .get(&room_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.message(id)).collect()
    }

    /// Up to `limit` messages older than `before_id`, newest first
    pub fn older_messages(
        &self,
        room_id: RoomId,
        before_id: MessageId,
        limit: usize,
    ) -> Vec<Message> {
        let ids: Vec<MessageId> = self
            .room_messages
            .get(&room_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        let mut older: Vec<MessageId> = ids.into_iter().filter(|id| *id < before_id).collect();
        older.reverse();
        older
            .into_iter()
            .take(limit)
            .filter_map(|id| self.message(id))
            .collect()
    }

    /// Messages in a room sent by `sender` and not yet read by `reader`
    pub fn unread_from(&self, room_id: RoomId, sender: UserId, reader: UserId) -> u64 {
        let ids: Vec<MessageId> = self
            .room_messages
            .get(&room_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.message(id))
            .filter(|msg| msg.sender == sender && !msg.read_by.contains(&reader))
            .count() as u64
    }

    /// Messages in a room from anyone but `viewer` that `viewer` has not
    /// read (the per-room badge count shown in room listings)
    pub fn room_unread_for(&self, room_id: RoomId, viewer: UserId) -> u64 {
        let ids: Vec<MessageId> = self
            .room_messages
            .get(&room_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.message(id))
            .filter(|msg| msg.sender != viewer && !msg.read_by.contains(&viewer))
            .count() as u64
    }

    // === Calls ===

    /// Create a pending call request
    pub fn create_call(&self, caller: UserId, recipient: UserId) -> CallRequest {
        let id = self.call_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let call = CallRequest {
            id,
            caller,
            recipient,
            status: CallStatus::Pending,
            initiated_at: Utc::now(),
            ended_at: None,
        };
        self.calls.insert(id, call.clone());
        debug!(call_id = id, caller, recipient, "Created call request");
        call
    }

    pub fn call(&self, id: CallId) -> Option<CallRequest> {
        self.calls.get(&id).map(|entry| entry.value().clone())
    }

    /// Run a closure against a call under its entry lock, serializing
    /// concurrent transitions. None for an unknown id.
    pub fn update_call<R>(
        &self,
        id: CallId,
        f: impl FnOnce(&mut CallRequest) -> R,
    ) -> Option<R> {
        let mut call = self.calls.get_mut(&id)?;
        Some(f(&mut call))
    }

    // === Notifications ===

    /// Persist a notification
    #[allow(clippy::too_many_arguments)]
    pub fn create_notification(
        &self,
        sender: UserId,
        receiver: UserId,
        kind: NotificationKind,
        post_id: Option<u64>,
        comment_id: Option<u64>,
        follow_id: Option<u64>,
        announcement: Option<String>,
    ) -> Notification {
        let id = self.notification_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification {
            id,
            sender,
            receiver,
            kind,
            post_id,
            comment_id,
            follow_id,
            announcement,
            created_at: Utc::now(),
            is_read: false,
        };
        self.notifications.insert(id, notification.clone());
        notification
    }

    /// Notifications addressed to a user, newest first
    pub fn notifications_for(&self, receiver: UserId) -> Vec<Notification> {
        let mut out: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.receiver == receiver)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        out
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken")]
    UsernameTaken,

    #[error("chat room not found")]
    RoomNotFound,
}
