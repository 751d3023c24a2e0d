//! Named delivery groups over live connections.
//!
//! The registry is the hub every fan-out goes through: sessions join
//! group keys (rooms, per-user channels, global channels), mutations
//! broadcast events to keys. Keys are opaque strings here; the routers
//! that own each namespace build them.
//!
//! Broadcasts snapshot the membership and release all registry locks
//! before delivering, so a slow or dead connection never blocks a
//! broadcaster or its siblings. Delivery is best-effort: a full queue
//! drops the event for that member, a closed queue prunes the member.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::UserId;

/// Connection identifier, unique per live socket
pub type ConnectionId = Uuid;

/// Handle to a live connection's outbound queue
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,

    /// Authenticated subject the connection belongs to
    pub user_id: UserId,

    tx: mpsc::Sender<Arc<String>>,
}

impl ConnectionHandle {
    pub fn new(user_id: UserId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx,
        }
    }
}

/// Registry of named delivery groups
#[derive(Clone, Default)]
pub struct GroupRegistry {
    /// Members per group key; a key exists only while it has members
    groups: Arc<DashMap<String, HashMap<ConnectionId, ConnectionHandle>>>,
}

impl GroupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
        }
    }

    /// Add a connection to a group, creating the group on first join
    pub fn join(&self, group: &str, handle: ConnectionHandle) {
        debug!(group, connection_id = %handle.id, user_id = handle.user_id, "Joined group");
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(handle.id, handle);
    }

    /// Remove a connection from a group, dissolving the group entry when
    /// it empties. Idempotent: unknown groups and members are no-ops.
    pub fn leave(&self, group: &str, connection_id: ConnectionId) {
        let emptied = match self.groups.get_mut(group) {
            Some(mut members) => {
                if members.remove(&connection_id).is_some() {
                    debug!(group, connection_id = %connection_id, "Left group");
                }
                members.is_empty()
            }
            None => return,
        };

        if emptied {
            // Re-checked under the entry lock; a concurrent join wins
            self.groups.remove_if(group, |_, members| members.is_empty());
        }
    }

    /// Whether a connection is currently a member of a group
    pub fn contains(&self, group: &str, connection_id: ConnectionId) -> bool {
        self.groups
            .get(group)
            .map(|members| members.contains_key(&connection_id))
            .unwrap_or(false)
    }

    /// Current member count of a group (0 for absent groups)
    pub fn member_count(&self, group: &str) -> usize {
        self.groups.get(group).map(|members| members.len()).unwrap_or(0)
    }

    /// Number of live groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Broadcast an event to every member of a group.
    ///
    /// Serializes once and shares the payload across members. Absent
    /// groups are a no-op. Returns the number of members the event was
    /// queued for.
    pub fn broadcast<T: Serialize>(&self, group: &str, event: &T) -> usize {
        self.broadcast_filtered(group, event, |_| true)
    }

    /// Broadcast restricted to members whose handle satisfies the filter
    /// (recipient-addressed signaling frames use this).
    pub fn broadcast_filtered<T, F>(&self, group: &str, event: &T, filter: F) -> usize
    where
        T: Serialize,
        F: Fn(&ConnectionHandle) -> bool,
    {
        let payload = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(err) => {
                warn!(group, error = %err, "Failed to serialize broadcast event");
                return 0;
            }
        };
        self.deliver(group, &payload, filter)
    }

    /// Broadcast one event to several groups, serializing once
    pub fn broadcast_many<T, I, S>(&self, groups: I, event: &T) -> usize
    where
        T: Serialize,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let payload = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(err) => {
                warn!(error = %err, "Failed to serialize broadcast event");
                return 0;
            }
        };
        groups
            .into_iter()
            .map(|group| self.deliver(group.as_ref(), &payload, |_| true))
            .sum()
    }

    fn deliver<F>(&self, group: &str, payload: &Arc<String>, filter: F) -> usize
    where
        F: Fn(&ConnectionHandle) -> bool,
    {
        // Snapshot the membership so no registry lock is held while
        // queueing. Members joining after this point miss the event;
        // members leaving after it may still receive it.
        let members: Vec<ConnectionHandle> = match self.groups.get(group) {
            Some(members) => members
                .values()
                .filter(|handle| filter(handle))
                .cloned()
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();
        for handle in &members {
            match handle.tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        group,
                        connection_id = %handle.id,
                        "Send queue full, dropping event for slow connection"
                    );
                }
                Err(TrySendError::Closed(_)) => dead.push(handle.id),
            }
        }

        for id in &dead {
            self.leave(group, *id);
        }
        if !dead.is_empty() {
            debug!(group, pruned = dead.len(), "Pruned closed connections");
        }

        delivered
    }
}
