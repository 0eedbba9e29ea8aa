//! # beacon-store
//!
//! Durable entity model and external-collaborator contracts for the Beacon
//! realtime hub.
//!
//! The hub itself never owns persistence: everything durable goes through
//! the [`RecordStore`] trait, and push delivery goes through [`Notifier`].
//! This crate defines those contracts, the entities they exchange, and an
//! in-memory reference implementation used by the server binary and tests.

pub mod entities;
pub mod memory;
pub mod notifier;
pub mod store;

pub use entities::{
    ChatMessage, CurrentParticipant, GroupRoom, LiveSession, OnlineUser, PrivateRoom, Role,
    RoomId, TotalParticipant, User, UserId, UserProfile,
};
pub use memory::MemoryStore;
pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use store::{
    ConversationKind, ConversationSummary, GroupSummary, NewMessage, RecordStore, StoreError,
};
