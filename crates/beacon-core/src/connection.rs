//! Per-channel connection state.
//!
//! A connection is owned by its channel task for the channel's lifetime and
//! never persisted. Delivery to a connection is a send on its unbounded
//! outbound queue: non-blocking, best-effort, and safe against a receiver
//! that has already gone away.

use beacon_protocol::ServerEvent;
use beacon_store::entities::{Role, UserId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Counter guaranteeing unique connection ids within the same nanosecond.
static CONN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection id.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let counter = CONN_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{counter:x}", timestamp))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Control frames on a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A wire frame to serialize and send.
    Event(ServerEvent),
    /// Transport-level liveness probe.
    Ping,
    /// Reply to a peer-initiated ping, echoing its payload.
    Pong(Vec<u8>),
    /// Terminate the write loop and close the socket.
    Close,
}

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving half, drained by the connection's write task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Create an outbound queue for one connection.
#[must_use]
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::unbounded_channel()
}

/// Authenticated identity attached to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub username: String,
}

/// Registry entry for one open channel, authenticated or not.
///
/// The liveness flag is cleared by each heartbeat sweep and re-armed by the
/// peer's pong; the sweep and the channel task share it through the `Arc`.
#[derive(Debug, Clone)]
pub struct ConnectionSeat {
    pub conn_id: ConnectionId,
    pub path: String,
    pub alive: Arc<AtomicBool>,
    pub sender: OutboundSender,
    /// Set once the channel authenticates.
    pub user_id: Option<UserId>,
}

impl ConnectionSeat {
    #[must_use]
    pub fn new(conn_id: ConnectionId, path: impl Into<String>, sender: OutboundSender) -> Self {
        Self {
            conn_id,
            path: path.into(),
            alive: Arc::new(AtomicBool::new(true)),
            sender,
            user_id: None,
        }
    }

    /// Re-arm the liveness flag (on pong or any sign of life).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
    }

    #[test]
    fn seat_liveness_round_trip() {
        let (tx, _rx) = outbound_channel();
        let seat = ConnectionSeat::new(ConnectionId::generate(), "/ws", tx);
        assert!(seat.is_alive());
        seat.alive.store(false, Ordering::Relaxed);
        assert!(!seat.is_alive());
        seat.mark_alive();
        assert!(seat.is_alive());
    }

    #[test]
    fn send_to_dropped_receiver_is_non_fatal() {
        let (tx, rx) = outbound_channel();
        drop(rx);
        assert!(tx.send(Outbound::Ping).is_err());
    }
}
