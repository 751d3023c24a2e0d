//! Data models for the Pulse realtime gateway.
//!
//! Entities mirror the relational shape of the social app (users, rooms,
//! messages, calls, notifications) but live in the in-memory store.
//! Wire models carry the exact JSON shapes the frontend speaks.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User identifier (sequence number, relational identity)
pub type UserId = u64;

/// Chat room identifier
pub type RoomId = u64;

/// Message identifier (monotonic per process)
pub type MessageId = u64;

/// Call request identifier
pub type CallId = u64;

/// Notification identifier
pub type NotificationId = u64;

/// Deterministic room name for a direct conversation between two users.
///
/// Ids are compared numerically, so `direct_room_name(7, 3)` and
/// `direct_room_name(3, 7)` both yield `room_3_7`.
pub fn direct_room_name(a: UserId, b: UserId) -> String {
    format!("room_{}_{}", a.min(b), a.max(b))
}

// ============================================================================
// Entities
// ============================================================================

/// A known user of the app
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,

    /// Unique display name
    pub username: String,

    /// Profile picture URL, if set
    pub profile_pic: Option<String>,

    /// Presence flag, flipped by chat sessions
    pub is_online: bool,

    pub created_at: DateTime<Utc>,
}

/// A direct or group chat room
#[derive(Debug, Clone)]
pub struct ChatRoom {
    pub id: RoomId,

    /// Deterministic `room_<min>_<max>` key (direct rooms only)
    pub room_name: Option<String>,

    /// Unique display name (group rooms only)
    pub group_name: Option<String>,

    pub is_group: bool,

    /// Current member set
    pub participants: HashSet<UserId>,
}

/// Kind of content a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Gif,
    Video,
}

/// A persisted chat message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,

    pub room_id: RoomId,

    pub sender: UserId,

    /// Text body (text messages only)
    pub message: Option<String>,

    /// Media reference (image/gif/video messages only)
    pub file: Option<String>,

    pub message_type: MessageType,

    /// Server-assigned; append order is the total order within a room
    pub timestamp: DateTime<Utc>,

    /// Users that have read this message (sorted on the wire)
    pub read_by: BTreeSet<UserId>,
}

impl Message {
    /// Read-by set as the frontend expects it (ascending ids)
    pub fn read_by_list(&self) -> Vec<UserId> {
        self.read_by.iter().copied().collect()
    }
}

/// Lifecycle state of a call request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Active,
    Ended,
    Declined,
    /// Kept for parity with the data model; no transition here produces it
    Missed,
}

/// A call between two users
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub id: CallId,

    pub caller: UserId,

    pub recipient: UserId,

    pub status: CallStatus,

    pub initiated_at: DateTime<Utc>,

    /// Stamped once, on the first transition to `ended`
    pub ended_at: Option<DateTime<Utc>>,
}

/// Kind of a notification event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Announcement,
}

/// A persisted notification
///
/// Post/comment/follow references are opaque ids; the referenced entities
/// live outside this service.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub sender: UserId,
    pub receiver: UserId,
    pub kind: NotificationKind,
    pub post_id: Option<u64>,
    pub comment_id: Option<u64>,
    pub follow_id: Option<u64>,
    pub announcement: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

// === API Request/Response Models ===

/// Create (or fetch) a direct room request
///
/// The caller is added to the participant set if absent; exactly two
/// participants must remain.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub participants: Vec<UserId>,
}

/// Create (or reshape) a group room request
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub group_name: String,
    /// Full member set; replaces the existing set on repeat creation
    #[serde(default)]
    pub participants: Vec<UserId>,
}

/// Create message request
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    /// Text body (required for `text`, forbidden otherwise)
    #[serde(default)]
    pub message: Option<String>,
    /// Media URL (required for `image`/`gif`/`video`, forbidden for `text`)
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
}

/// Create message request addressed by room id (group rooms have no
/// deterministic room name)
#[derive(Debug, Deserialize)]
pub struct CreateMessageByIdRequest {
    pub room_id: RoomId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
}

/// Initiate call request
#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub recipient_id: UserId,
    /// WebRTC offer forwarded opaquely to the recipient
    #[serde(default)]
    pub offer: Option<Value>,
}

/// Event-bus entry: single-receiver notification from the mutation layer
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub receiver_id: UserId,
    pub notification_type: NotificationKind,
    #[serde(default)]
    pub post_id: Option<u64>,
    #[serde(default)]
    pub comment_id: Option<u64>,
    #[serde(default)]
    pub follow_id: Option<u64>,
}

/// Admin announcement request
#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// Feed-update broadcast trigger
#[derive(Debug, Deserialize)]
pub struct FeedUpdateRequest {
    pub post_id: u64,
}

/// Seed a user (dev/test convenience; account CRUD lives elsewhere)
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

/// User as embedded in room responses
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub profile_pic: Option<String>,
    pub is_online: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            profile_pic: user.profile_pic.clone(),
            is_online: user.is_online,
        }
    }
}

/// Message as returned by the REST surface
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub sender: UserId,
    pub message: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub read_by: Vec<UserId>,
    pub sender_username: Option<String>,
    pub sender_profile_pic: Option<String>,
}

/// Room as returned by the REST surface
#[derive(Debug, Clone, Serialize)]
pub struct RoomResponse {
    pub id: RoomId,
    pub room_name: Option<String>,
    pub participants: Vec<UserSummary>,
    pub messages: Vec<MessageResponse>,
    pub is_group: bool,
    pub group_name: Option<String>,
    /// Messages from other participants the requesting user has not read
    pub unread_count: u64,
}

/// Leave group response
#[derive(Debug, Serialize)]
pub struct LeaveGroupResponse {
    pub success: String,
}

/// Initiate call response
#[derive(Debug, Serialize)]
pub struct InitiateCallResponse {
    pub message: String,
    pub call_request: CallId,
}

/// Accept/decline/end call response
#[derive(Debug, Serialize)]
pub struct CallActionResponse {
    pub message: String,
}

/// Notification as returned by the REST surface
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: NotificationId,
    pub sender: UserId,
    pub sender_username: Option<String>,
    pub sender_profile_pic: Option<String>,
    pub receiver: UserId,
    pub receiver_username: Option<String>,
    pub notification_type: NotificationKind,
    pub post_id: Option<u64>,
    pub comment_id: Option<u64>,
    pub follow_id: Option<u64>,
    pub announcement_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Announcement creation response
#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub status: String,
}

/// Feed-update trigger response
#[derive(Debug, Serialize)]
pub struct FeedUpdateResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

// === WebSocket Event Models ===

/// Query parameters accepted at WebSocket connection time
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Inbound frame on a chat session
///
/// `message_sent` is a signal, not content: the sender persists the message
/// over REST first, then pokes the room so everyone relays the latest
/// message. Extra fields the frontend includes are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageSent {
        #[serde(default)]
        message_id: Option<MessageId>,
    },
    MessageRead {
        message_id: MessageId,
        user_id: UserId,
    },
}

/// Inbound frame on a video-call session
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SignalEvent {
    VideoCallOffer {
        offer: Value,
        recipient_id: UserId,
        sender_username: String,
    },
    VideoCallAnswer {
        answer: Value,
        recipient_id: UserId,
    },
    IceCandidate {
        candidate: Value,
        recipient_id: UserId,
    },
    EndCall {
        sender_id: UserId,
        recipient_id: UserId,
    },
}

/// Outbound frame relayed to the other leg of a video-call session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SignalFrame {
    VideoCallOffer {
        offer: Value,
        sender_username: String,
    },
    VideoCallAnswer {
        answer: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    EndCall {
        sender_id: UserId,
    },
}

/// Tagged event pushed to notification, call and chat groups
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// Read receipt for a single message
    MessageRead {
        message_id: MessageId,
        read_by: Vec<UserId>,
        timestamp: DateTime<Utc>,
    },
    /// Per-peer unread tallies for the receiving user
    UnreadCounts {
        unread_counts: HashMap<UserId, u64>,
    },
    /// Call lifecycle notification; `caller`/`caller_id` always name the
    /// call's originator, `offer` is present on initiation only
    CallNotification {
        caller: String,
        call_id: CallId,
        status: CallStatus,
        caller_id: UserId,
        offer: Option<Value>,
    },
    /// Single-receiver notification
    Notification {
        sender: String,
        notification_type: NotificationKind,
        post_id: Option<u64>,
        created_at: DateTime<Utc>,
    },
    /// Admin broadcast to every connected notification session
    Announcement {
        announcement: String,
        created_at: DateTime<Utc>,
    },
    /// A post changed; clients refetch through the feed API
    FeedUpdate {
        post_id: u64,
    },
}

/// Extra sender fields carried by group-room message payloads
#[derive(Debug, Clone, Serialize)]
pub struct GroupSenderInfo {
    pub sender_username: String,
    pub sender_profile_pic: Option<String>,
}

/// Latest-message payload relayed to a chat room after `message_sent`
///
/// Untagged on purpose: the frontend detects it by the absence of a
/// `type` field.
#[derive(Debug, Clone, Serialize)]
pub struct LatestMessagePayload {
    pub message: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub sender: UserId,
    pub timestamp: DateTime<Utc>,
    pub read_by: Vec<UserId>,
    pub message_id: MessageId,
    #[serde(flatten)]
    pub group_sender: Option<GroupSenderInfo>,
}
