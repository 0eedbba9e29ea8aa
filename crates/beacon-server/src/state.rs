//! Shared server state.
//!
//! The registries are constructed once at process start and handed to the
//! router and handlers by reference — never ambient globals — so they can
//! be exercised in tests with fake channels and the in-memory store.

use crate::config::Config;
use beacon_core::{ConnectionRegistry, RoomDirectory};
use beacon_store::{Notifier, RecordStore};
use std::sync::Arc;

/// Everything a handler needs: the ephemeral registries and the external
/// collaborators.
pub struct AppState {
    /// Identity-to-connection index.
    pub registry: ConnectionRegistry,
    /// Ephemeral live-session membership.
    pub rooms: RoomDirectory,
    /// Durable record store.
    pub store: Arc<dyn RecordStore>,
    /// Best-effort push sender.
    pub notifier: Arc<dyn Notifier>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(),
            store,
            notifier,
            config,
        }
    }
}
