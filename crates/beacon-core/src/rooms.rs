//! Ephemeral room membership for live sessions.
//!
//! Purely in-memory: seeded on start, grown on join, shrunk on leave and
//! disconnect, dropped on end or when the last member leaves. Lost on
//! process restart by design — durable participant rows are the record.

use crate::registry::ConnectionRegistry;
use beacon_protocol::ServerEvent;
use beacon_store::entities::{RoomId, UserId};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// roomId -> present member identities.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: DashMap<RoomId, HashSet<UserId>>,
}

impl RoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room containing exactly the host.
    pub fn seed(&self, room_id: impl Into<RoomId>, host: &UserId) {
        let room_id = room_id.into();
        debug!(room = %room_id, host = %host, "Seeding live room");
        self.rooms
            .insert(room_id, HashSet::from([host.clone()]));
    }

    /// Add a member. Returns `true` if the user was not already present.
    pub fn join(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .insert(user_id.clone())
    }

    /// Remove a member. Returns `true` if the user was present. An emptied
    /// room is dropped.
    pub fn leave(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let Some(mut members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        let emptied = members.is_empty();
        drop(members);
        if emptied {
            self.rooms.remove(room_id);
            debug!(room = %room_id, "Dropped empty live room");
        }
        removed
    }

    #[must_use]
    pub fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(user_id))
    }

    #[must_use]
    pub fn members(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a room wholesale (on session end). Returns the final members.
    pub fn remove_room(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms
            .remove(room_id)
            .map(|(_, members)| members.into_iter().collect())
            .unwrap_or_default()
    }

    /// Every room the user is currently inside. Used by teardown.
    #[must_use]
    pub fn rooms_of(&self, user_id: &UserId) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().contains(user_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Fan an event out to every member except `except`, delivering through
    /// the registry. Best-effort per recipient; returns the queued count.
    pub fn broadcast(
        &self,
        registry: &ConnectionRegistry,
        room_id: &RoomId,
        event: &ServerEvent,
        except: Option<&UserId>,
    ) -> usize {
        let mut delivered = 0;
        for member in self.members(room_id) {
            if except.is_some_and(|ex| *ex == member) {
                continue;
            }
            if registry.send_to(&member, event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
