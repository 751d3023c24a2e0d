//! Notification, announcement, and feed fan-out.
//!
//! `notify` is the event-bus entry used by the (external) mutation layer:
//! likes, comments, and follows land here as opaque references and get
//! pushed to the receiver's notification group. Announcements persist a
//! copy per known user but go over the wire once, to the shared
//! `admin_announcement` group. Feed updates carry nothing but a post id;
//! clients refetch the post through the feed API.

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Notification, NotificationKind, PushEvent, UserId};
use crate::registry::GroupRegistry;
use crate::store::Store;
use crate::unread::user_notifications_group;

/// Group every notification session joins for admin broadcasts
pub const ADMIN_ANNOUNCEMENT_GROUP: &str = "admin_announcement";

/// Group every notification session joins for feed-update pings
pub const FEED_GROUP: &str = "feed";

/// Notification fan-out errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("receiver not found")]
    ReceiverNotFound,
}

/// Persists notifications and pushes them to live sessions
#[derive(Clone)]
pub struct NotificationFanout {
    store: Store,
    registry: GroupRegistry,
}

impl NotificationFanout {
    pub fn new(store: Store, registry: GroupRegistry) -> Self {
        Self { store, registry }
    }

    /// Persist a notification and push it to the receiver's group.
    ///
    /// Self-notifications (liking your own post) are skipped without
    /// error and return `None`.
    pub fn notify(
        &self,
        sender: UserId,
        receiver: UserId,
        kind: NotificationKind,
        post_id: Option<u64>,
        comment_id: Option<u64>,
        follow_id: Option<u64>,
    ) -> Result<Option<Notification>, NotifyError> {
        if self.store.user(receiver).is_none() {
            return Err(NotifyError::ReceiverNotFound);
        }
        if sender == receiver {
            debug!(sender, "Skipping self-notification");
            return Ok(None);
        }

        let notification =
            self.store
                .create_notification(sender, receiver, kind, post_id, comment_id, follow_id, None);
        self.registry.broadcast(
            &user_notifications_group(receiver),
            &PushEvent::Notification {
                sender: self.store.username(sender).unwrap_or_default(),
                notification_type: notification.kind,
                post_id: notification.post_id,
                created_at: notification.created_at,
            },
        );
        Ok(Some(notification))
    }

    /// Persist an announcement for every known user, then broadcast it
    /// once to the shared group. Returns how many copies were persisted.
    pub fn announce(&self, sender: UserId, content: &str) -> usize {
        let mut stamp = None;
        let mut persisted = 0;
        for receiver in self.store.user_ids() {
            let notification = self.store.create_notification(
                sender,
                receiver,
                NotificationKind::Announcement,
                None,
                None,
                None,
                Some(content.to_owned()),
            );
            stamp.get_or_insert(notification.created_at);
            persisted += 1;
        }

        let delivered = self.registry.broadcast(
            ADMIN_ANNOUNCEMENT_GROUP,
            &PushEvent::Announcement {
                announcement: content.to_owned(),
                created_at: stamp.unwrap_or_else(chrono::Utc::now),
            },
        );
        info!(persisted, delivered, "Announcement sent");
        persisted
    }

    /// Tell every notification session a post changed
    pub fn feed_update(&self, post_id: u64) {
        let delivered = self
            .registry
            .broadcast(FEED_GROUP, &PushEvent::FeedUpdate { post_id });
        debug!(post_id, delivered, "Feed update sent");
    }
}
