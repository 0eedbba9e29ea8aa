//! The process-wide connection registry.
//!
//! Three sharded maps, mirroring the shape the hub actually queries:
//!
//! - `online`:  userId -> [`OnlinePeer`] — presence, rosters, takeover
//! - `senders`: userId -> outbound queue — direct delivery
//! - `seats`:   connId -> [`ConnectionSeat`] — every open channel,
//!   authenticated or not; the heartbeat sweep walks this one
//!
//! Read-modify-write sequences (evict prior session, then install) run
//! under the map's entry lock so concurrent authentications for the same
//! identity cannot interleave.

use crate::connection::{ConnectionId, ConnectionSeat, Outbound, OutboundSender};
use beacon_protocol::ServerEvent;
use beacon_store::entities::{Role, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// An authenticated channel, as seen by the rest of the process.
#[derive(Debug, Clone)]
pub struct OnlinePeer {
    pub conn_id: ConnectionId,
    pub path: String,
    pub role: Role,
    pub username: String,
    pub sender: OutboundSender,
}

/// Identity-keyed connection index.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    online: DashMap<UserId, OnlinePeer>,
    senders: DashMap<UserId, OutboundSender>,
    seats: DashMap<ConnectionId, ConnectionSeat>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened channel. Called before authentication.
    pub fn register(&self, seat: ConnectionSeat) {
        debug!(connection = %seat.conn_id, path = %seat.path, "Channel opened");
        self.seats.insert(seat.conn_id.clone(), seat);
    }

    /// Stop tracking a channel. Returns the seat if it was present.
    pub fn deregister(&self, conn_id: &ConnectionId) -> Option<ConnectionSeat> {
        self.seats.remove(conn_id).map(|(_, seat)| seat)
    }

    /// Install an authenticated identity, evicting any prior same-path
    /// session for that identity.
    ///
    /// The prior channel (if any, and if it is a different channel on the
    /// same path) is sent [`Outbound::Close`] and returned so the caller
    /// can log the takeover. A prior session on a *different* path is
    /// replaced in the maps but left open.
    pub fn install(&self, user_id: &UserId, peer: OnlinePeer) -> Option<OnlinePeer> {
        let conn_id = peer.conn_id.clone();
        let sender = peer.sender.clone();

        let evicted = match self.online.entry(user_id.clone()) {
            Entry::Occupied(mut slot) => {
                let prior = slot.get();
                let takeover = prior.path == peer.path && prior.conn_id != peer.conn_id;
                let old = slot.insert(peer);
                if takeover {
                    debug!(user = %user_id, old_connection = %old.conn_id, "Evicting stale session");
                    let _ = old.sender.send(Outbound::Close);
                    Some(old)
                } else {
                    None
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(peer);
                None
            }
        };

        self.senders.insert(user_id.clone(), sender);
        if let Some(mut seat) = self.seats.get_mut(&conn_id) {
            seat.user_id = Some(user_id.clone());
        }
        evicted
    }

    /// Remove an identity from both maps, but only while they still point
    /// at `conn_id`. A channel evicted by a takeover must not tear down its
    /// successor's entry. Returns the removed peer.
    pub fn remove_identity_if(
        &self,
        user_id: &UserId,
        conn_id: &ConnectionId,
    ) -> Option<OnlinePeer> {
        let removed = self
            .online
            .remove_if(user_id, |_, peer| peer.conn_id == *conn_id)
            .map(|(_, peer)| peer);
        if removed.is_some() {
            self.senders.remove(user_id);
            debug!(user = %user_id, connection = %conn_id, "Identity removed from registry");
        }
        removed
    }

    /// Deliver an event to a user's open channel, if any.
    ///
    /// Returns `true` when the event was queued.
    pub fn send_to(&self, user_id: &UserId, event: ServerEvent) -> bool {
        self.senders
            .get(user_id)
            .is_some_and(|sender| sender.send(Outbound::Event(event)).is_ok())
    }

    /// Broadcast an event to every open channel, authenticated or not.
    ///
    /// Returns the number of channels the event was queued for. A closed
    /// recipient is skipped, never an error.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for seat in self.seats.iter() {
            if seat.sender.send(Outbound::Event(event.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Online user ids holding the given role.
    #[must_use]
    pub fn roster_with_role(&self, role: Role) -> Vec<UserId> {
        self.online
            .iter()
            .filter(|peer| peer.role == role)
            .map(|peer| peer.key().clone())
            .collect()
    }

    /// Every online (authenticated) user id.
    #[must_use]
    pub fn online_user_ids(&self) -> Vec<UserId> {
        self.senders.iter().map(|s| s.key().clone()).collect()
    }

    #[must_use]
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.online.contains_key(user_id)
    }

    /// Snapshot of every open channel, for the heartbeat sweep. Cloned out
    /// so the sweep never holds a shard lock across an await point.
    #[must_use]
    pub fn seat_snapshot(&self) -> Vec<ConnectionSeat> {
        self.seats.iter().map(|seat| seat.value().clone()).collect()
    }

    /// Number of open channels.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.seats.len()
    }

    /// Number of authenticated identities.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.online.len()
    }
}
