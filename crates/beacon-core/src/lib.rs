//! # beacon-core
//!
//! Ephemeral shared state for the Beacon realtime hub.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Connection** - Per-channel state: identity, liveness, outbound queue
//! - **Registry** - Identity-to-connection index with stale-session takeover
//! - **Rooms** - Ephemeral live-session membership and room broadcast
//! - **Error** - The non-fatal error taxonomy handlers speak
//!
//! Nothing here touches a socket or a database: delivery is an unbounded
//! channel send, persistence lives behind the `beacon-store` traits. That
//! keeps every structure testable with fake channels.

pub mod connection;
pub mod error;
pub mod registry;
pub mod rooms;

pub use connection::{
    outbound_channel, ConnectionId, ConnectionSeat, Identity, Outbound, OutboundReceiver,
    OutboundSender,
};
pub use error::HubError;
pub use registry::{ConnectionRegistry, OnlinePeer};
pub use rooms::RoomDirectory;
