//! WebSocket integration tests for the Pulse gateway.
//!
//! Boots the real server on an ephemeral port and drives live sockets
//! with tokio-tungstenite: upgrade auth, chat relay, read receipts,
//! unread pushes, call signaling and notification broadcast.

use std::collections::HashSet;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use pulse_backend::calls::{user_call_group, video_call_group};
use pulse_backend::models::{MessageType, NotificationKind};
use pulse_backend::rooms::{direct_chat_group, group_chat_group};
use pulse_backend::unread::user_notifications_group;
use pulse_backend::{build_router, AppState, Config};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot the gateway on an ephemeral port, seeded with three users:
/// ana (1), ben (2), eve (3). Returns the ws base url and the state.
async fn boot_server() -> (String, AppState) {
    let state = AppState::new(Config::default());
    for name in ["ana", "ben", "eve"] {
        state.store.create_user(name, None).unwrap();
    }

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}", addr), state)
}

fn token_for(state: &AppState, user_id: u64) -> String {
    state.auth.sign(user_id, 3600).unwrap()
}

async fn connect(base: &str, path: &str, token: &str) -> WsStream {
    let (ws, _) = connect_async(format!("{}{}?token={}", base, path, token))
        .await
        .expect("upgrade refused");
    ws
}

/// Group joins happen in the spawned session task after the upgrade
/// completes; poll until the registry catches up.
async fn wait_for_members(state: &AppState, group: &str, n: usize) {
    for _ in 0..100 {
        if state.registry.member_count(group) == n {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "group {} never reached {} members (has {})",
        group,
        n,
        state.registry.member_count(group)
    );
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never happened", what);
}

/// Next text frame on the socket, parsed
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let frame = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed while waiting for a frame")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(ws: &mut WsStream, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Assert nothing is waiting on the socket
async fn assert_silent(ws: &mut WsStream) {
    let res = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(res.is_err(), "expected silence, got {:?}", res);
}

// =============================================================================
// Upgrade Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_unauthenticated_upgrade_refused() {
    let (base, state) = boot_server().await;

    let refused = connect_async(format!("{}/ws/chat/room_1_2", base)).await;
    assert!(refused.is_err());

    let refused = connect_async(format!("{}/ws/chat/room_1_2?token=not-a-jwt", base)).await;
    assert!(refused.is_err());

    // A refused upgrade never joins anything
    assert_eq!(state.registry.group_count(), 0);
}

#[tokio::test]
async fn test_foreign_subject_upgrade_refused() {
    let (base, state) = boot_server().await;
    let ana = token_for(&state, 1);

    // Ana's token cannot open sockets addressed to ben
    for path in [
        "/ws/unreadnotifications/2",
        "/ws/call/2",
        "/ws/video-call/2/1",
    ] {
        let refused = connect_async(format!("{}{}?token={}", base, path, ana)).await;
        assert!(refused.is_err(), "{} accepted a foreign subject", path);
    }

    assert_eq!(state.registry.group_count(), 0);
}

// =============================================================================
// Chat Relay Tests
// =============================================================================

#[tokio::test]
async fn test_chat_relay_reaches_every_member() {
    let (base, state) = boot_server().await;
    let room = state.store.get_or_create_direct_room(1, 2);
    let msg = state
        .store
        .create_message(room.id, 1, Some("hi ben".into()), None, MessageType::Text)
        .unwrap();

    let mut ana = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 1)).await;
    let mut ben = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 2)).await;
    wait_for_members(&state, &direct_chat_group("room_1_2"), 2).await;

    send_json(&mut ana, json!({"type": "message_sent", "message_id": msg.id})).await;

    // The relay reads the latest message back out of the store and hands
    // it to everyone, the sender included. No type tag on this one.
    let frame = read_json(&mut ben).await;
    assert_eq!(frame["message"], "hi ben");
    assert_eq!(frame["sender"], 1);
    assert_eq!(frame["message_id"], msg.id);
    assert!(frame.get("type").is_none());

    let echo = read_json(&mut ana).await;
    assert_eq!(echo["message_id"], msg.id);
}

#[tokio::test]
async fn test_read_receipt_fans_out() {
    let (base, state) = boot_server().await;
    let room = state.store.get_or_create_direct_room(1, 2);
    let msg = state
        .store
        .create_message(room.id, 1, Some("hi ben".into()), None, MessageType::Text)
        .unwrap();

    let mut ana = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 1)).await;
    let mut ben = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 2)).await;
    wait_for_members(&state, &direct_chat_group("room_1_2"), 2).await;

    send_json(
        &mut ben,
        json!({"type": "message_read", "message_id": msg.id, "user_id": 2}),
    )
    .await;

    let receipt = read_json(&mut ana).await;
    assert_eq!(receipt["type"], "message_read");
    assert_eq!(receipt["message_id"], msg.id);
    assert_eq!(receipt["read_by"], json!([2]));

    assert!(state.store.message(msg.id).unwrap().read_by.contains(&2));
}

#[tokio::test]
async fn test_group_chat_relay_names_the_sender() {
    let (base, state) = boot_server().await;
    let room = state
        .store
        .create_group_room("hikers", HashSet::from([1, 2]));
    state
        .store
        .create_message(room.id, 1, Some("hello group".into()), None, MessageType::Text)
        .unwrap();

    let path = format!("/ws/groupchat/{}", room.id);
    let mut ana = connect(&base, &path, &token_for(&state, 1)).await;
    let mut ben = connect(&base, &path, &token_for(&state, 2)).await;
    wait_for_members(&state, &group_chat_group(room.id), 2).await;

    send_json(&mut ana, json!({"type": "message_sent"})).await;

    // Group payloads carry the sender's display fields inline
    let frame = read_json(&mut ben).await;
    assert_eq!(frame["message"], "hello group");
    assert_eq!(frame["sender_username"], "ana");

    let echo = read_json(&mut ana).await;
    assert_eq!(echo["sender_username"], "ana");
}

// =============================================================================
// Unread Count Push Tests
// =============================================================================

#[tokio::test]
async fn test_unread_counts_follow_message_signal() {
    let (base, state) = boot_server().await;
    let room = state.store.get_or_create_direct_room(1, 2);
    state
        .store
        .create_message(room.id, 2, Some("you there?".into()), None, MessageType::Text)
        .unwrap();

    let mut ana = connect(&base, "/ws/unreadnotifications/1", &token_for(&state, 1)).await;
    wait_for_members(&state, &user_notifications_group(1), 1).await;

    let mut ben = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 2)).await;
    wait_for_members(&state, &direct_chat_group("room_1_2"), 1).await;

    send_json(&mut ben, json!({"type": "message_sent"})).await;

    let counts = read_json(&mut ana).await;
    assert_eq!(counts["type"], "unread_counts");
    assert_eq!(counts["unread_counts"]["2"], 1);
    assert_eq!(counts["unread_counts"]["3"], 0);
}

// =============================================================================
// Call Signaling Tests
// =============================================================================

#[tokio::test]
async fn test_video_call_frames_reach_only_the_addressed_peer() {
    let (base, state) = boot_server().await;

    let mut ana = connect(&base, "/ws/video-call/1/2", &token_for(&state, 1)).await;
    let mut ben = connect(&base, "/ws/video-call/2/1", &token_for(&state, 2)).await;
    wait_for_members(&state, &video_call_group(1, 2), 2).await;

    send_json(
        &mut ana,
        json!({
            "action": "video_call_offer",
            "offer": {"sdp": "v=0"},
            "recipient_id": 2,
            "sender_username": "ana"
        }),
    )
    .await;

    let offer = read_json(&mut ben).await;
    assert_eq!(offer["action"], "video_call_offer");
    assert_eq!(offer["offer"]["sdp"], "v=0");
    assert_eq!(offer["sender_username"], "ana");
    // Routing fields are stripped before the relay
    assert!(offer.get("recipient_id").is_none());

    // No echo back to the sender's leg
    assert_silent(&mut ana).await;

    send_json(
        &mut ben,
        json!({
            "action": "video_call_answer",
            "answer": {"sdp": "v=0"},
            "recipient_id": 1
        }),
    )
    .await;

    let answer = read_json(&mut ana).await;
    assert_eq!(answer["action"], "video_call_answer");
    assert_silent(&mut ben).await;
}

#[tokio::test]
async fn test_call_lifecycle_reaches_both_call_groups() {
    let (base, state) = boot_server().await;

    let mut ana = connect(&base, "/ws/call/1", &token_for(&state, 1)).await;
    let mut ben = connect(&base, "/ws/call/2", &token_for(&state, 2)).await;
    wait_for_members(&state, &user_call_group(1), 1).await;
    wait_for_members(&state, &user_call_group(2), 1).await;

    // Initiation lands on the recipient's socket, offer and all
    let call = state
        .calls
        .initiate(1, 2, Some(json!({"sdp": "v=0"})))
        .unwrap();

    let ring = read_json(&mut ben).await;
    assert_eq!(ring["type"], "call_notification");
    assert_eq!(ring["caller"], "ana");
    assert_eq!(ring["caller_id"], 1);
    assert_eq!(ring["call_id"], call.id);
    assert_eq!(ring["status"], "pending");
    assert_eq!(ring["offer"]["sdp"], "v=0");

    // Acceptance goes back to the caller's socket only
    state.calls.accept(call.id, 2).unwrap();

    let answer = read_json(&mut ana).await;
    assert_eq!(answer["type"], "call_notification");
    assert_eq!(answer["status"], "active");
    assert_eq!(answer["caller_id"], 1);

    assert_silent(&mut ben).await;
}

// =============================================================================
// Presence and Teardown Tests
// =============================================================================

#[tokio::test]
async fn test_chat_session_flips_presence() {
    let (base, state) = boot_server().await;
    state.store.get_or_create_direct_room(1, 2);
    assert!(!state.store.user(1).unwrap().is_online);

    let ana = connect(&base, "/ws/chat/room_1_2", &token_for(&state, 1)).await;
    wait_until("ana comes online", || state.store.user(1).unwrap().is_online).await;

    drop(ana);
    wait_until("ana goes offline", || !state.store.user(1).unwrap().is_online).await;
}

#[tokio::test]
async fn test_departed_socket_leaves_its_groups() {
    let (base, state) = boot_server().await;

    let ana = connect(&base, "/ws/unreadnotifications/1", &token_for(&state, 1)).await;
    wait_for_members(&state, &user_notifications_group(1), 1).await;

    drop(ana);
    wait_until("ana's session is torn down", || {
        state.registry.member_count(&user_notifications_group(1)) == 0
    })
    .await;
}

// =============================================================================
// Notification Broadcast Tests
// =============================================================================

#[tokio::test]
async fn test_announcement_and_feed_reach_notification_sessions() {
    let (base, state) = boot_server().await;

    let mut ana = connect(&base, "/ws/unreadnotifications/1", &token_for(&state, 1)).await;
    wait_for_members(&state, &user_notifications_group(1), 1).await;

    state.notify.announce(2, "Scheduled maintenance tonight");

    let frame = read_json(&mut ana).await;
    assert_eq!(frame["type"], "announcement");
    assert_eq!(frame["announcement"], "Scheduled maintenance tonight");

    state.notify.feed_update(55);

    let frame = read_json(&mut ana).await;
    assert_eq!(frame["type"], "feed_update");
    assert_eq!(frame["post_id"], 55);
}

#[tokio::test]
async fn test_notification_push_reaches_the_receiver() {
    let (base, state) = boot_server().await;

    let mut ben = connect(&base, "/ws/unreadnotifications/2", &token_for(&state, 2)).await;
    wait_for_members(&state, &user_notifications_group(2), 1).await;

    state
        .notify
        .notify(1, 2, NotificationKind::Like, Some(7), None, None)
        .unwrap();

    let frame = read_json(&mut ben).await;
    assert_eq!(frame["type"], "notification");
    assert_eq!(frame["sender"], "ana");
    assert_eq!(frame["notification_type"], "like");
    assert_eq!(frame["post_id"], 7);
}
