//! Call lifecycle and WebRTC signaling relay.
//!
//! Two independent channels cooperate here. The lifecycle channel moves a
//! CallRequest through `pending -> active | declined | ended` over REST and
//! pushes a `call_notification` event to the parties' per-user call groups
//! on every transition. The signaling channel relays opaque offer/answer/ICE
//! frames between the two legs of a pair group; it carries no state beyond
//! group membership, and it keeps working whatever the CallRequest says.
//!
//! Only the recipient may accept or decline, and only while the call is
//! still pending. Either party may end from any state; ending twice is
//! accepted and keeps the original `ended_at`.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{CallId, CallRequest, CallStatus, PushEvent, SignalEvent, SignalFrame, UserId};
use crate::registry::GroupRegistry;
use crate::store::Store;

/// Group key for a user's call-notification channel
pub fn user_call_group(user_id: UserId) -> String {
    format!("usercall_{user_id}")
}

/// Group key for the signaling channel between two users.
///
/// Order-independent over numeric ids, like direct room names.
pub fn video_call_group(a: UserId, b: UserId) -> String {
    format!("video_call_{}_{}", a.min(b), a.max(b))
}

/// Call lifecycle errors
#[derive(Debug, Error)]
pub enum CallError {
    #[error("call not found")]
    NotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("only the call recipient may accept or decline")]
    NotRecipient,

    #[error("user is not part of this call")]
    NotParticipant,

    #[error("call is no longer pending")]
    NotPending,
}

/// Owns call lifecycle transitions and the signaling relay
#[derive(Clone)]
pub struct CallSignalingRouter {
    store: Store,
    registry: GroupRegistry,
}

impl CallSignalingRouter {
    pub fn new(store: Store, registry: GroupRegistry) -> Self {
        Self { store, registry }
    }

    /// Create a pending call and push it (with the WebRTC offer, when the
    /// caller sent one) to the recipient's call group.
    pub fn initiate(
        &self,
        caller: UserId,
        recipient: UserId,
        offer: Option<Value>,
    ) -> Result<CallRequest, CallError> {
        if self.store.user(recipient).is_none() {
            return Err(CallError::RecipientNotFound);
        }

        let call = self.store.create_call(caller, recipient);
        info!(call_id = call.id, caller, recipient, "Call initiated");
        self.registry
            .broadcast(&user_call_group(recipient), &self.call_event(&call, offer));
        Ok(call)
    }

    /// Recipient accepts a pending call; the caller's group hears about it
    pub fn accept(&self, call_id: CallId, acting: UserId) -> Result<CallRequest, CallError> {
        let call = self
            .store
            .update_call(call_id, |call| {
                if acting != call.recipient {
                    return Err(CallError::NotRecipient);
                }
                if call.status != CallStatus::Pending {
                    return Err(CallError::NotPending);
                }
                call.status = CallStatus::Active;
                Ok(call.clone())
            })
            .ok_or(CallError::NotFound)??;

        info!(call_id, "Call accepted");
        self.registry
            .broadcast(&user_call_group(call.caller), &self.call_event(&call, None));
        Ok(call)
    }

    /// Recipient declines a pending call; the caller's group hears about it
    pub fn decline(&self, call_id: CallId, acting: UserId) -> Result<CallRequest, CallError> {
        let call = self
            .store
            .update_call(call_id, |call| {
                if acting != call.recipient {
                    return Err(CallError::NotRecipient);
                }
                if call.status != CallStatus::Pending {
                    return Err(CallError::NotPending);
                }
                call.status = CallStatus::Declined;
                Ok(call.clone())
            })
            .ok_or(CallError::NotFound)??;

        info!(call_id, "Call declined");
        self.registry
            .broadcast(&user_call_group(call.caller), &self.call_event(&call, None));
        Ok(call)
    }

    /// Either party ends the call, from any state. `ended_at` is stamped on
    /// the first end and stays put after that; both call groups are told.
    pub fn end(&self, call_id: CallId, acting: UserId) -> Result<CallRequest, CallError> {
        let call = self
            .store
            .update_call(call_id, |call| {
                if acting != call.caller && acting != call.recipient {
                    return Err(CallError::NotParticipant);
                }
                call.status = CallStatus::Ended;
                if call.ended_at.is_none() {
                    call.ended_at = Some(Utc::now());
                }
                Ok(call.clone())
            })
            .ok_or(CallError::NotFound)??;

        info!(call_id, "Call ended");
        self.registry.broadcast_many(
            [user_call_group(call.caller), user_call_group(call.recipient)],
            &self.call_event(&call, None),
        );
        Ok(call)
    }

    /// Relay a signaling frame to the addressed party's leg of the pair
    /// group. Both parties sit in the group, so the recipient filter keeps
    /// the sender from echoing its own frames back. Routing fields are
    /// stripped from the relayed frame.
    pub fn relay(&self, group: &str, event: SignalEvent) {
        let (recipient, frame) = match event {
            SignalEvent::VideoCallOffer {
                offer,
                recipient_id,
                sender_username,
            } => (
                recipient_id,
                SignalFrame::VideoCallOffer {
                    offer,
                    sender_username,
                },
            ),
            SignalEvent::VideoCallAnswer {
                answer,
                recipient_id,
            } => (recipient_id, SignalFrame::VideoCallAnswer { answer }),
            SignalEvent::IceCandidate {
                candidate,
                recipient_id,
            } => (recipient_id, SignalFrame::IceCandidate { candidate }),
            SignalEvent::EndCall {
                sender_id,
                recipient_id,
            } => (recipient_id, SignalFrame::EndCall { sender_id }),
        };

        let delivered = self
            .registry
            .broadcast_filtered(group, &frame, |handle| handle.user_id == recipient);
        debug!(group, recipient, delivered, "Relayed signaling frame");
    }

    /// `caller`/`caller_id` always name the call's originator, whichever
    /// party triggered the transition
    fn call_event(&self, call: &CallRequest, offer: Option<Value>) -> PushEvent {
        PushEvent::CallNotification {
            caller: self.store.username(call.caller).unwrap_or_default(),
            call_id: call.id,
            status: call.status,
            caller_id: call.caller,
            offer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use serde_json::{json, Value as Json};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn setup() -> (Store, GroupRegistry, CallSignalingRouter) {
        let store = Store::new();
        let registry = GroupRegistry::new();
        let router = CallSignalingRouter::new(store.clone(), registry.clone());
        store.create_user("ana", None).unwrap();
        store.create_user("ben", None).unwrap();
        store.create_user("eve", None).unwrap();
        (store, registry, router)
    }

    fn listen(
        registry: &GroupRegistry,
        group: &str,
        user_id: UserId,
    ) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(8);
        registry.join(group, ConnectionHandle::new(user_id, tx));
        rx
    }

    #[tokio::test]
    async fn initiate_notifies_recipient_with_offer() {
        let (_store, registry, router) = setup();
        let mut rx = listen(&registry, &user_call_group(2), 2);

        let call = router
            .initiate(1, 2, Some(json!({"sdp": "v=0"})))
            .unwrap();
        assert_eq!(call.status, CallStatus::Pending);

        let event: Json = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(event["type"], "call_notification");
        assert_eq!(event["caller"], "ana");
        assert_eq!(event["caller_id"], 1);
        assert_eq!(event["call_id"], call.id);
        assert_eq!(event["status"], "pending");
        assert_eq!(event["offer"]["sdp"], "v=0");
    }

    #[test]
    fn initiate_rejects_unknown_recipient() {
        let (_store, _registry, router) = setup();
        assert!(matches!(
            router.initiate(1, 99, None),
            Err(CallError::RecipientNotFound)
        ));
    }

    #[tokio::test]
    async fn accept_moves_pending_to_active_and_notifies_caller() {
        let (_store, registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        let mut caller_rx = listen(&registry, &user_call_group(1), 1);

        let accepted = router.accept(call.id, 2).unwrap();
        assert_eq!(accepted.status, CallStatus::Active);

        let event: Json = serde_json::from_str(&caller_rx.recv().await.unwrap()).unwrap();
        assert_eq!(event["status"], "active");
        assert_eq!(event["caller_id"], 1);
        assert!(event["offer"].is_null());
    }

    #[test]
    fn only_recipient_may_accept_or_decline() {
        let (_store, _registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();

        assert!(matches!(
            router.accept(call.id, 1),
            Err(CallError::NotRecipient)
        ));
        assert!(matches!(
            router.decline(call.id, 3),
            Err(CallError::NotRecipient)
        ));
    }

    #[tokio::test]
    async fn decline_reports_the_callers_id() {
        let (_store, registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        let mut caller_rx = listen(&registry, &user_call_group(1), 1);

        router.decline(call.id, 2).unwrap();

        let event: Json = serde_json::from_str(&caller_rx.recv().await.unwrap()).unwrap();
        assert_eq!(event["status"], "declined");
        // The originator's id, not the declining recipient's
        assert_eq!(event["caller_id"], 1);
    }

    #[test]
    fn accept_after_decline_is_a_conflict() {
        let (store, _registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        router.decline(call.id, 2).unwrap();

        assert!(matches!(
            router.accept(call.id, 2),
            Err(CallError::NotPending)
        ));
        assert_eq!(store.call(call.id).unwrap().status, CallStatus::Declined);
    }

    #[tokio::test]
    async fn end_notifies_both_parties_and_pins_ended_at() {
        let (store, registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        router.accept(call.id, 2).unwrap();
        let mut caller_rx = listen(&registry, &user_call_group(1), 1);
        let mut recipient_rx = listen(&registry, &user_call_group(2), 2);

        let ended = router.end(call.id, 1).unwrap();
        let first_ended_at = ended.ended_at.unwrap();

        for rx in [&mut caller_rx, &mut recipient_rx] {
            let event: Json = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(event["status"], "ended");
        }

        // Re-ending succeeds and keeps the original timestamp
        let again = router.end(call.id, 2).unwrap();
        assert_eq!(again.ended_at.unwrap(), first_ended_at);
        assert_eq!(store.call(call.id).unwrap().status, CallStatus::Ended);
    }

    #[test]
    fn end_by_pending_recipient_is_allowed() {
        let (_store, _registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        let ended = router.end(call.id, 2).unwrap();
        assert_eq!(ended.status, CallStatus::Ended);
    }

    #[test]
    fn third_party_end_is_forbidden() {
        let (_store, _registry, router) = setup();
        let call = router.initiate(1, 2, None).unwrap();
        assert!(matches!(
            router.end(call.id, 3),
            Err(CallError::NotParticipant)
        ));
    }

    #[test]
    fn lifecycle_on_missing_call_is_not_found() {
        let (_store, _registry, router) = setup();
        assert!(matches!(router.accept(42, 2), Err(CallError::NotFound)));
        assert!(matches!(router.decline(42, 2), Err(CallError::NotFound)));
        assert!(matches!(router.end(42, 2), Err(CallError::NotFound)));
    }

    #[tokio::test]
    async fn relay_addresses_only_the_recipient_leg() {
        let (_store, registry, router) = setup();
        let group = video_call_group(1, 2);
        let mut caller_rx = listen(&registry, &group, 1);
        let mut callee_rx = listen(&registry, &group, 2);

        router.relay(
            &group,
            SignalEvent::VideoCallOffer {
                offer: json!({"sdp": "v=0"}),
                recipient_id: 2,
                sender_username: "ana".into(),
            },
        );

        let frame: Json = serde_json::from_str(&callee_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["action"], "video_call_offer");
        assert_eq!(frame["sender_username"], "ana");
        // Routing fields are not echoed to the wire
        assert!(frame.get("recipient_id").is_none());
        assert!(caller_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn relay_answer_and_candidate_flow_back_to_caller() {
        let (_store, registry, router) = setup();
        let group = video_call_group(1, 2);
        let mut caller_rx = listen(&registry, &group, 1);
        let _callee_rx = listen(&registry, &group, 2);

        router.relay(
            &group,
            SignalEvent::VideoCallAnswer {
                answer: json!({"sdp": "answer"}),
                recipient_id: 1,
            },
        );
        router.relay(
            &group,
            SignalEvent::IceCandidate {
                candidate: json!({"candidate": "cand"}),
                recipient_id: 1,
            },
        );

        let answer: Json = serde_json::from_str(&caller_rx.recv().await.unwrap()).unwrap();
        assert_eq!(answer["action"], "video_call_answer");
        let candidate: Json = serde_json::from_str(&caller_rx.recv().await.unwrap()).unwrap();
        assert_eq!(candidate["action"], "ice_candidate");
    }

    #[test]
    fn video_call_group_is_order_independent() {
        assert_eq!(video_call_group(7, 3), "video_call_3_7");
        assert_eq!(video_call_group(3, 7), "video_call_3_7");
        assert_eq!(video_call_group(10, 2), "video_call_2_10");
    }
}
