//! Unread accounting pushed to per-user notification channels.
//!
//! Counts are recomputed from the message store on every chat mutation
//! and pushed whole; clients overwrite, never merge. Only direct rooms
//! (the deterministic `room_<min>_<max>` keys) are counted.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{direct_room_name, PushEvent, UserId};
use crate::registry::GroupRegistry;
use crate::store::Store;

/// Group key for a user's notification channel
pub fn user_notifications_group(user_id: UserId) -> String {
    format!("unreadnotifications_{user_id}")
}

/// Recomputes per-peer unread tallies and pushes them out
#[derive(Clone)]
pub struct UnreadCounter {
    store: Store,
    registry: GroupRegistry,
}

impl UnreadCounter {
    pub fn new(store: Store, registry: GroupRegistry) -> Self {
        Self { store, registry }
    }

    /// Unread messages `reader` has from `sender` in their direct room.
    /// A missing room counts zero.
    pub fn unread_from(&self, reader: UserId, sender: UserId) -> u64 {
        match self.store.room_by_name(&direct_room_name(reader, sender)) {
            Some(room) => self.store.unread_from(room.id, sender, reader),
            None => 0,
        }
    }

    /// Per-peer unread map for one user, covering every other known user
    pub fn counts_for(&self, reader: UserId) -> HashMap<UserId, u64> {
        self.store
            .user_ids()
            .into_iter()
            .filter(|id| *id != reader)
            .map(|other| (other, self.unread_from(reader, other)))
            .collect()
    }

    /// Recompute counts for every known user and push each user their own
    /// map. Quadratic in users; the store answers per-room counts from
    /// memory, which keeps this viable at this layer's scale.
    pub fn push_all(&self) {
        let user_ids = self.store.user_ids();
        debug!(users = user_ids.len(), "Pushing unread counts");
        for user_id in user_ids {
            let unread_counts = self.counts_for(user_id);
            self.registry.broadcast(
                &user_notifications_group(user_id),
                &PushEvent::UnreadCounts { unread_counts },
            );
        }
    }
}
