//! HTTP and WebSocket-upgrade handlers for the Pulse gateway.
//!
//! REST handlers authenticate from the `Authorization: Bearer` header,
//! falling back to a `?token=` query parameter. WebSocket upgrades carry
//! the token in the query string only and are authenticated *before* the
//! upgrade is accepted; a refused upgrade never joins a group.
//!
//! Fan-out triggered by a handler is best-effort: delivery failures are
//! logged by the routers and never surface in the HTTP response.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{extract_bearer_token, AuthError, TokenValidator};
use crate::calls::{CallError, CallSignalingRouter};
use crate::config::Config;
use crate::models::*;
use crate::notify::{NotificationFanout, NotifyError};
use crate::registry::GroupRegistry;
use crate::rooms::{ChatRoomRouter, RoomError};
use crate::session::{ConnectionSession, SessionVariant};
use crate::store::{Store, StoreError};
use crate::unread::UnreadCounter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    /// Live connection groups
    pub registry: GroupRegistry,
    /// Bearer token validation
    pub auth: TokenValidator,
    pub unread: UnreadCounter,
    pub rooms: ChatRoomRouter,
    pub calls: CallSignalingRouter,
    pub notify: NotificationFanout,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Store::new();
        let registry = GroupRegistry::new();
        let auth = TokenValidator::new(&config.auth_secret);
        let unread = UnreadCounter::new(store.clone(), registry.clone());
        let rooms = ChatRoomRouter::new(store.clone(), registry.clone(), unread.clone());
        let calls = CallSignalingRouter::new(store.clone(), registry.clone());
        let notify = NotificationFanout::new(store.clone(), registry.clone());
        Self {
            config: Arc::new(config),
            store,
            registry,
            auth,
            unread,
            rooms,
            calls,
            notify,
        }
    }
}

// === Health Check ===

/// GET /api/health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Authentication Helpers ===

/// Pull the bearer credential out of a REST request: the Authorization
/// header wins, the `?token=` query parameter is the fallback.
fn request_token(headers: &HeaderMap, query: &ConnectQuery) -> Result<String, AuthError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::InvalidHeader)?;
        return extract_bearer_token(value)
            .map(str::to_string)
            .ok_or(AuthError::InvalidHeader);
    }
    query.token.clone().ok_or(AuthError::MissingToken)
}

/// Resolve the calling user for a REST request
fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query: &ConnectQuery,
) -> Result<User, AuthError> {
    let token = request_token(headers, query)?;
    state.auth.authenticate(&token, &state.store)
}

/// Resolve the connecting user before a WebSocket upgrade is accepted
fn authenticate_upgrade(state: &AppState, query: &ConnectQuery) -> Result<User, AuthError> {
    let token = query.token.as_deref().ok_or(AuthError::MissingToken)?;
    state.auth.authenticate(token, &state.store)
}

// === Users ===

/// POST /api/users - Seed a user (dev/test convenience)
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::InvalidInput("username must not be empty"));
    }

    let user = state.store.create_user(&req.username, req.profile_pic)?;
    info!(user_id = user.id, "User created");

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

// === Chat Rooms ===

/// GET /api/chatrooms - Rooms the caller participates in
pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let rooms = state
        .store
        .rooms_for_user(user.id)
        .iter()
        .map(|room| room_response(&state, room, user.id))
        .collect();
    Ok(Json(rooms))
}

/// POST /api/chatrooms - Get or create the direct room with one peer
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let room = state.rooms.create_direct(user.id, req.participants)?;
    debug!(room_id = room.id, "Direct room ready");

    Ok((
        StatusCode::CREATED,
        Json(room_response(&state, &room, user.id)),
    ))
}

/// GET /api/chatrooms/:room_id - Room detail, participants only
pub async fn room_detail(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<RoomResponse>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let room = state
        .store
        .room(room_id)
        .ok_or(ApiError::NotFound("chat room not found"))?;
    if !room.participants.contains(&user.id) {
        return Err(ApiError::Forbidden("not a participant of this room"));
    }

    Ok(Json(room_response(&state, &room, user.id)))
}

/// POST /api/chatrooms/create-group - Get or create a group room.
///
/// Repeat creation under the same name replaces the member set with the
/// submitted one.
pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let room = state
        .rooms
        .create_group(user.id, &req.group_name, req.participants)?;
    debug!(room_id = room.id, "Group room ready");

    Ok((
        StatusCode::CREATED,
        Json(room_response(&state, &room, user.id)),
    ))
}

/// GET /api/chatrooms/user-groups - Caller's group rooms
pub async fn user_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let groups = state
        .store
        .groups_for_user(user.id)
        .iter()
        .map(|room| room_response(&state, room, user.id))
        .collect();
    Ok(Json(groups))
}

/// POST /api/chatrooms/:room_id/leave-group - Leave a group room.
///
/// The last member to leave dissolves the room.
pub async fn leave_group(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<LeaveGroupResponse>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let outcome = state.rooms.leave_group(room_id, user.id)?;
    info!(room_id, user_id = user.id, ?outcome, "Left group");

    Ok(Json(LeaveGroupResponse {
        success: "Left group successfully.".to_string(),
    }))
}

// === Messages ===

/// GET /api/messages/:room_name - Full room history in timeline order
pub async fn room_messages(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    authenticate(&state, &headers, &query)?;

    let room = state
        .store
        .room_by_name(&room_name)
        .ok_or(ApiError::NotFound("chat room not found"))?;
    Ok(Json(history_responses(&state, room.id)))
}

/// GET /api/messages/:room_name/older/:oldest_message_id - One page of
/// history older than the cursor, newest first
pub async fn older_messages(
    State(state): State<AppState>,
    Path((room_name, oldest_message_id)): Path<(String, MessageId)>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    authenticate(&state, &headers, &query)?;

    let room = state
        .store
        .room_by_name(&room_name)
        .ok_or(ApiError::NotFound("chat room not found"))?;
    let page = state
        .store
        .older_messages(room.id, oldest_message_id, state.config.history_page_size)
        .iter()
        .map(|msg| message_response(&state, msg))
        .collect();
    Ok(Json(page))
}

/// POST /api/messages/:room_name - Persist a message.
///
/// Persisting is decoupled from fan-out: the sender pokes its chat
/// session with `message_sent` afterwards and the room relays the
/// latest message from the store.
pub async fn create_message(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;
    validate_message(req.message.as_deref(), req.file.as_deref(), req.message_type)?;

    let room = state
        .store
        .room_by_name(&room_name)
        .ok_or(ApiError::NotFound("chat room not found"))?;
    let msg = state
        .store
        .create_message(room.id, user.id, req.message, req.file, req.message_type)?;
    debug!(room_id = room.id, message_id = msg.id, "Message created");

    Ok((StatusCode::CREATED, Json(message_response(&state, &msg))))
}

/// GET /api/messages/list-with-id/:room_id - History addressed by room
/// id (group rooms have no deterministic room name)
pub async fn room_messages_by_id(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    authenticate(&state, &headers, &query)?;

    let room = state
        .store
        .room(room_id)
        .ok_or(ApiError::NotFound("chat room not found"))?;
    Ok(Json(history_responses(&state, room.id)))
}

/// POST /api/messages/create-with-id - Persist a message, room id in body
pub async fn create_message_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateMessageByIdRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;
    validate_message(req.message.as_deref(), req.file.as_deref(), req.message_type)?;

    let msg = state
        .store
        .create_message(req.room_id, user.id, req.message, req.file, req.message_type)?;
    debug!(room_id = req.room_id, message_id = msg.id, "Message created");

    Ok((StatusCode::CREATED, Json(message_response(&state, &msg))))
}

// === Unread Counts ===

/// GET /api/unread_counts - Caller's per-peer unread map snapshot
pub async fn unread_counts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<HashMap<UserId, u64>>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;
    Ok(Json(state.unread.counts_for(user.id)))
}

// === Calls ===

/// POST /api/initiate_call - Create a pending call and notify the
/// recipient's call group
pub async fn initiate_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<InitiateCallRequest>,
) -> Result<(StatusCode, Json<InitiateCallResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let call = state.calls.initiate(user.id, req.recipient_id, req.offer)?;
    Ok((
        StatusCode::CREATED,
        Json(InitiateCallResponse {
            message: "Call initiated".to_string(),
            call_request: call.id,
        }),
    ))
}

/// POST /api/accept_call/:call_id - Recipient accepts a pending call
pub async fn accept_call(
    State(state): State<AppState>,
    Path(call_id): Path<CallId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<CallActionResponse>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    state.calls.accept(call_id, user.id)?;
    Ok(Json(CallActionResponse {
        message: "Call accepted".to_string(),
    }))
}

/// POST /api/decline_call/:call_id - Recipient declines a pending call
pub async fn decline_call(
    State(state): State<AppState>,
    Path(call_id): Path<CallId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<CallActionResponse>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    state.calls.decline(call_id, user.id)?;
    Ok(Json(CallActionResponse {
        message: "Call declined".to_string(),
    }))
}

/// POST /api/end_call/:call_id - Either party ends the call
pub async fn end_call(
    State(state): State<AppState>,
    Path(call_id): Path<CallId>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<CallActionResponse>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    state.calls.end(call_id, user.id)?;
    Ok(Json(CallActionResponse {
        message: "Call ended".to_string(),
    }))
}

// === Notifications ===

/// POST /api/notifications - Event-bus entry for the mutation layer.
///
/// 201 with the persisted notification; 204 when the self-notification
/// skip applies.
pub async fn create_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    match state.notify.notify(
        user.id,
        req.receiver_id,
        req.notification_type,
        req.post_id,
        req.comment_id,
        req.follow_id,
    )? {
        Some(notification) => Ok((
            StatusCode::CREATED,
            Json(notification_response(&state, &notification)),
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/notifications - Caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let notifications = state
        .store
        .notifications_for(user.id)
        .iter()
        .map(|notification| notification_response(&state, notification))
        .collect();
    Ok(Json(notifications))
}

/// POST /api/announcements - Persist an announcement for every user and
/// broadcast it once
pub async fn create_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), ApiError> {
    let user = authenticate(&state, &headers, &query)?;

    let content = match req.content.as_deref() {
        Some(content) if !content.trim().is_empty() => content,
        _ => return Err(ApiError::InvalidInput("content is required")),
    };
    state.notify.announce(user.id, content);

    Ok((
        StatusCode::CREATED,
        Json(AnnouncementResponse {
            status: "Announcement sent".to_string(),
        }),
    ))
}

/// POST /api/feed - Tell every notification session a post changed
pub async fn feed_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    Json(req): Json<FeedUpdateRequest>,
) -> Result<Json<FeedUpdateResponse>, ApiError> {
    authenticate(&state, &headers, &query)?;

    state.notify.feed_update(req.post_id);
    Ok(Json(FeedUpdateResponse {
        message: "Feed update broadcast".to_string(),
    }))
}

// === WebSocket Upgrades ===

/// GET /ws/chat/:room_name - Direct chat session
pub async fn ws_chat(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = authenticate_upgrade(&state, &query)?;

    Ok(ws.on_upgrade(move |socket| {
        ConnectionSession::new(state, user, SessionVariant::DirectChat { room_name }).run(socket)
    }))
}

/// GET /ws/groupchat/:room_id - Group chat session
pub async fn ws_groupchat(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = authenticate_upgrade(&state, &query)?;

    Ok(ws.on_upgrade(move |socket| {
        ConnectionSession::new(state, user, SessionVariant::GroupChat { room_id }).run(socket)
    }))
}

/// GET /ws/unreadnotifications/:user_id - Receive-only notification
/// session; the path user must be the token subject
pub async fn ws_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = authenticate_upgrade(&state, &query)?;
    if user.id != user_id {
        return Err(ApiError::Forbidden(
            "token subject does not match the path user",
        ));
    }

    Ok(ws.on_upgrade(move |socket| {
        ConnectionSession::new(state, user, SessionVariant::Notifications).run(socket)
    }))
}

/// GET /ws/video-call/:user_id/:caller_id - WebRTC signaling session
/// between the path user and one peer
pub async fn ws_video_call(
    State(state): State<AppState>,
    Path((user_id, caller_id)): Path<(UserId, UserId)>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = authenticate_upgrade(&state, &query)?;
    if user.id != user_id {
        return Err(ApiError::Forbidden(
            "token subject does not match the path user",
        ));
    }

    Ok(ws.on_upgrade(move |socket| {
        ConnectionSession::new(state, user, SessionVariant::VideoCall { peer: caller_id })
            .run(socket)
    }))
}

/// GET /ws/call/:user_id - Receive-only call-notification session; the
/// path user must be the token subject
pub async fn ws_call(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = authenticate_upgrade(&state, &query)?;
    if user.id != user_id {
        return Err(ApiError::Forbidden(
            "token subject does not match the path user",
        ));
    }

    Ok(ws.on_upgrade(move |socket| {
        ConnectionSession::new(state, user, SessionVariant::CallNotifications).run(socket)
    }))
}

// === Response Assembly ===

/// `message` XOR `file`, consistent with the declared message type
fn validate_message(
    message: Option<&str>,
    file: Option<&str>,
    message_type: MessageType,
) -> Result<(), ApiError> {
    match (message, file) {
        (Some(_), Some(_)) => Err(ApiError::InvalidInput(
            "message and file are mutually exclusive",
        )),
        (None, None) => Err(ApiError::InvalidInput("message or file is required")),
        (Some(_), None) if message_type != MessageType::Text => Err(ApiError::InvalidInput(
            "media messages carry a file reference",
        )),
        (None, Some(_)) if message_type == MessageType::Text => Err(ApiError::InvalidInput(
            "text messages carry a message body",
        )),
        _ => Ok(()),
    }
}

fn message_response(state: &AppState, msg: &Message) -> MessageResponse {
    let sender = state.store.user(msg.sender);
    MessageResponse {
        id: msg.id,
        sender: msg.sender,
        message: msg.message.clone(),
        file: msg.file.clone(),
        message_type: msg.message_type,
        timestamp: msg.timestamp,
        read_by: msg.read_by_list(),
        sender_username: sender.as_ref().map(|user| user.username.clone()),
        sender_profile_pic: sender.as_ref().and_then(|user| user.profile_pic.clone()),
    }
}

fn history_responses(state: &AppState, room_id: RoomId) -> Vec<MessageResponse> {
    state
        .store
        .room_history(room_id)
        .iter()
        .map(|msg| message_response(state, msg))
        .collect()
}

fn room_response(state: &AppState, room: &ChatRoom, viewer: UserId) -> RoomResponse {
    let mut participants: Vec<UserSummary> = room
        .participants
        .iter()
        .filter_map(|id| state.store.user(*id))
        .map(|user| UserSummary::from(&user))
        .collect();
    participants.sort_unstable_by_key(|user| user.id);

    RoomResponse {
        id: room.id,
        room_name: room.room_name.clone(),
        participants,
        messages: history_responses(state, room.id),
        is_group: room.is_group,
        group_name: room.group_name.clone(),
        unread_count: state.store.room_unread_for(room.id, viewer),
    }
}

fn notification_response(state: &AppState, notification: &Notification) -> NotificationResponse {
    let sender = state.store.user(notification.sender);
    NotificationResponse {
        id: notification.id,
        sender: notification.sender,
        sender_username: sender.as_ref().map(|user| user.username.clone()),
        sender_profile_pic: sender.as_ref().and_then(|user| user.profile_pic.clone()),
        receiver: notification.receiver,
        receiver_username: state.store.username(notification.receiver),
        notification_type: notification.kind,
        post_id: notification.post_id,
        comment_id: notification.comment_id,
        follow_id: notification.follow_id,
        announcement_content: notification.announcement.clone(),
        created_at: notification.created_at,
        is_read: notification.is_read,
    }
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(&'static str),
    /// Authenticated, but not allowed to act here
    Forbidden(&'static str),
    NotFound(&'static str),
    /// Legal request against an entity in the wrong state
    Conflict(&'static str),
    /// Authorization error (wraps AuthError)
    Auth(AuthError),
}

/// Implement From<AuthError> to enable ? operator in handlers
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken => ApiError::Conflict("username already taken"),
            StoreError::RoomNotFound => ApiError::NotFound("chat room not found"),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::InvalidParticipants => {
                ApiError::InvalidInput("a direct room needs exactly two distinct participants")
            }
            RoomError::InvalidGroupName => ApiError::InvalidInput("group name must not be empty"),
            RoomError::UserNotFound => ApiError::NotFound("user not found"),
            RoomError::GroupNotFound => ApiError::NotFound("group not found"),
        }
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::NotFound => ApiError::NotFound("call not found"),
            CallError::RecipientNotFound => ApiError::NotFound("recipient not found"),
            CallError::NotRecipient => {
                ApiError::Forbidden("only the call recipient may accept or decline")
            }
            CallError::NotParticipant => ApiError::Forbidden("user is not part of this call"),
            CallError::NotPending => ApiError::Conflict("call is no longer pending"),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::ReceiverNotFound => ApiError::NotFound("receiver not found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(auth_err) => auth_err.into_response(),
            other => {
                let (status, code, message) = match other {
                    ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
                    ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
                    ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                    ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                    ApiError::Auth(_) => unreachable!(),
                };

                let body = Json(ErrorResponse {
                    error: message.to_string(),
                    code,
                });

                (status, body).into_response()
            }
        }
    }
}
