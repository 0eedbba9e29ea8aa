//! Shared helpers for handler tests: fake channels standing in for live
//! sockets, an in-memory store, and token minting.

use crate::auth::Claims;
use crate::config::Config;
use crate::dispatch::Session;
use crate::state::AppState;
use beacon_core::{
    outbound_channel, ConnectionId, ConnectionSeat, OnlinePeer, Outbound, OutboundReceiver,
};
use beacon_protocol::ServerEvent;
use beacon_store::entities::{now_millis, Role, User};
use beacon_store::{LogNotifier, MemoryStore, RecordStore};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

/// A state with fixed secret, in-memory store, and log notifier.
pub(crate) fn test_state() -> Arc<AppState> {
    let mut config = Config::default();
    config.auth.token_secret = "test-secret".into();
    Arc::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(LogNotifier),
    ))
}

/// Mint a valid HS256 token for `id`.
pub(crate) fn issue(secret: &str, id: &str, role: Role) -> String {
    let now = now_millis() as i64 / 1000;
    let claims = Claims {
        id: id.into(),
        role,
        email: format!("{id}@example.com"),
        iat: now,
        exp: now + 900,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("token encodes")
}

/// Put a user row in the store.
pub(crate) async fn seed_user(state: &AppState, id: &str, role: Role) {
    state
        .store
        .upsert_user(User {
            id: id.into(),
            email: format!("{id}@example.com"),
            username: id.into(),
            role,
            push_token: None,
            profile_image: None,
        })
        .await
        .expect("user seeds");
}

/// Open a channel that has not authenticated yet.
pub(crate) fn unauthenticated_session(
    state: &AppState,
    conn: &str,
) -> (Session, OutboundReceiver) {
    let (tx, rx) = outbound_channel();
    let seat = ConnectionSeat::new(ConnectionId::new(conn), "/ws", tx);
    let session = Session::for_seat(&seat);
    state.registry.register(seat);
    (session, rx)
}

/// Open a channel and install `user` as its authenticated identity,
/// bypassing token verification.
pub(crate) fn connect_user(
    state: &AppState,
    user: &str,
    role: Role,
    conn: &str,
) -> (Session, OutboundReceiver) {
    let (mut session, rx) = unauthenticated_session(state, conn);
    state.registry.install(
        &user.to_string(),
        OnlinePeer {
            conn_id: session.conn_id.clone(),
            path: session.path.clone(),
            role,
            username: user.into(),
            sender: session.sender.clone(),
        },
    );
    session.identity = Some(beacon_core::Identity {
        user_id: user.into(),
        role,
        username: user.into(),
    });
    (session, rx)
}

/// Pop the next queued wire frame, panicking on anything else.
pub(crate) fn recv_event(rx: &mut OutboundReceiver) -> ServerEvent {
    match rx.try_recv() {
        Ok(Outbound::Event(event)) => event,
        other => panic!("expected an event frame, got {other:?}"),
    }
}

/// Drain every queued wire frame, discarding pings and closes.
pub(crate) fn drain(rx: &mut OutboundReceiver) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Outbound::Event(event) = frame {
            events.push(event);
        }
    }
    events
}
