//! WebSocket endpoint and connection lifecycle.
//!
//! One read loop and one write task per channel. Frames on a single
//! channel are handled strictly in arrival order — the handler is awaited
//! to completion before the next frame — while distinct channels proceed
//! fully concurrently. The write task drains the unbounded outbound queue,
//! so no broadcaster ever blocks on a slow socket.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::state::AppState;
use crate::{dispatch, heartbeat};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        MatchedPath, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use beacon_core::{
    outbound_channel, ConnectionId, ConnectionSeat, Outbound, OutboundReceiver,
};
use beacon_protocol::{encode_server, ServerEvent};
use beacon_store::entities::UserId;
use beacon_store::{Notifier, RecordStore};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(
    config: Config,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone(), store, notifier));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let _heartbeat = heartbeat::spawn(state.clone());

    // Build router: one WebSocket route per configured logical path.
    let mut app = Router::new().route("/health", get(health_handler));
    for path in &config.transport.paths {
        app = app.route(path, get(ws_handler));
    }
    let app = app.with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Beacon hub listening on {}", addr);
    for path in &config.transport.paths {
        info!("WebSocket endpoint: ws://{}{}", addr, path);
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    path: MatchedPath,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let path = path.as_str().to_string();
    ws.on_upgrade(move |socket| handle_websocket(socket, state, path))
}

/// Handle a WebSocket connection for its whole lifetime.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, path: String) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let conn_id = ConnectionId::generate();
    let (outbound_tx, outbound_rx) = outbound_channel();

    let seat = ConnectionSeat::new(conn_id.clone(), path.clone(), outbound_tx.clone());
    let alive = seat.alive.clone();
    let mut session = dispatch::Session::for_seat(&seat);
    state.registry.register(seat);

    debug!(connection = %conn_id, path = %path, "WebSocket connected");

    let (ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(write_loop(ws_sender, outbound_rx));

    session.reply(ServerEvent::info("Connected. Please authenticate."));

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch::handle_frame(&state, &mut session, &text).await;
            }
            Ok(Message::Binary(data)) => {
                // Some clients send JSON text as binary frames.
                match String::from_utf8(data) {
                    Ok(text) => dispatch::handle_frame(&state, &mut session, &text).await,
                    Err(_) => session.reply(ServerEvent::error("Invalid JSON")),
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Outbound::Pong(payload));
            }
            Ok(Message::Pong(_)) => {
                // Re-arm liveness for the next heartbeat sweep.
                alive.store(true, Ordering::Relaxed);
            }
            Ok(Message::Close(_)) => {
                debug!(connection = %conn_id, "Received close frame");
                break;
            }
            Err(e) => {
                warn!(connection = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    teardown(
        &state,
        &conn_id,
        session.identity.as_ref().map(|identity| &identity.user_id),
    )
    .await;

    // Stop the write task; it also exits on its own if the sink is dead.
    let _ = outbound_tx.send(Outbound::Close);
    let _ = writer.await;

    debug!(connection = %conn_id, "WebSocket disconnected");
}

/// Drain the outbound queue into the socket.
async fn write_loop(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
) {
    while let Some(frame) = outbound.recv().await {
        let message = match frame {
            Outbound::Event(event) => match encode_server(&event) {
                Ok(text) => {
                    metrics::record_frame("outbound");
                    Message::Text(text)
                }
                Err(err) => {
                    warn!(error = %err, "Dropping unencodable frame");
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Vec::new()),
            Outbound::Pong(payload) => Message::Pong(payload),
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };
        if sink.send(message).await.is_err() {
            break;
        }
    }
}

/// Teardown shared by graceful close and heartbeat eviction.
///
/// Removes the identity from both registry maps (guarded: only while they
/// still point at this channel), sweeps the user out of every live room —
/// deleting the current-participant row and telling the remaining members —
/// and finally broadcasts the global offline presence event.
pub(crate) async fn teardown(state: &AppState, conn_id: &ConnectionId, user_id: Option<&UserId>) {
    state.registry.deregister(conn_id);

    let Some(user_id) = user_id else {
        return;
    };
    let Some(peer) = state.registry.remove_identity_if(user_id, conn_id) else {
        // A newer session owns this identity now; nothing else to reclaim.
        return;
    };

    for room_id in state.rooms.rooms_of(user_id) {
        if state.rooms.leave(&room_id, user_id) {
            if let Err(err) = state
                .store
                .remove_current_participant(user_id, &room_id)
                .await
            {
                error!(
                    user = %user_id,
                    room = %room_id,
                    error = %err,
                    "Failed to delete current participant on disconnect"
                );
            }
            let delivered = state.rooms.broadcast(
                &state.registry,
                &room_id,
                &ServerEvent::user_left_live(user_id.clone(), room_id.clone()),
                Some(user_id),
            );
            metrics::record_broadcast(delivered);
        }
    }
    metrics::set_active_rooms(state.rooms.room_count());

    state
        .registry
        .broadcast_all(&ServerEvent::user_status(user_id.clone(), Some(peer.role), false));
    debug!(user = %user_id, connection = %conn_id, "Channel torn down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live;
    use crate::testutil::{connect_user, drain, recv_event, test_state};
    use beacon_store::entities::Role;

    #[tokio::test]
    async fn teardown_reclaims_rooms_and_broadcasts_offline() {
        let state = test_state();
        let (host, mut host_rx) = connect_user(&state, "host", Role::Host, "c-host");
        live::start(&state, &host, Some("t".into()), None).await.unwrap();
        let room_id = match recv_event(&mut host_rx) {
            ServerEvent::LiveStarted { data } => data.room_id,
            other => panic!("unexpected: {other:?}"),
        };

        let (viewer, mut viewer_rx) = connect_user(&state, "v", Role::Viewer, "c-v");
        live::join(&state, &viewer, room_id.clone()).await.unwrap();
        drain(&mut host_rx);
        drain(&mut viewer_rx);

        teardown(&state, &viewer.conn_id, Some(&"v".to_string())).await;

        assert!(!state.rooms.is_member(&room_id, &"v".to_string()));
        assert!(!state
            .store
            .current_participants(&room_id)
            .await
            .unwrap()
            .iter()
            .any(|p| p.user_id == "v"));
        // Total participation is history and survives the disconnect.
        assert!(state
            .store
            .total_participants(&room_id)
            .await
            .unwrap()
            .iter()
            .any(|p| p.user_id == "v"));

        // The host hears the room departure, then the global offline event.
        assert!(matches!(
            recv_event(&mut host_rx),
            ServerEvent::UserLeftLive { data } if data.user_id == "v"
        ));
        assert!(matches!(
            recv_event(&mut host_rx),
            ServerEvent::UserStatus { data } if data.user_id == "v" && !data.is_online
        ));
    }

    #[tokio::test]
    async fn teardown_for_an_evicted_channel_spares_the_successor() {
        let state = test_state();
        let (_old, _old_rx) = connect_user(&state, "alice", Role::Viewer, "c-old");
        let (new, _new_rx) = connect_user(&state, "alice", Role::Viewer, "c-new");

        // The evicted channel closes after the takeover; its teardown must
        // not remove the new session's registry entry.
        teardown(&state, &ConnectionId::new("c-old"), Some(&"alice".to_string())).await;

        assert!(state.registry.is_online(&"alice".to_string()));
        assert!(state
            .registry
            .send_to(&"alice".to_string(), ServerEvent::info("still here")));
        drop(new);
    }

    #[tokio::test]
    async fn teardown_of_unauthenticated_channel_is_quiet() {
        let state = test_state();
        let (peer, mut peer_rx) = connect_user(&state, "p", Role::Viewer, "c-p");

        teardown(&state, &ConnectionId::new("c-ghost"), None).await;

        assert!(drain(&mut peer_rx).is_empty());
        drop(peer);
    }
}
