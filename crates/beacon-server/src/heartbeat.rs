//! Heartbeat monitor.
//!
//! The sole mechanism for detecting silently-dead channels. Each sweep
//! walks every open channel: a channel whose liveness flag is still clear
//! (no pong since the previous sweep) is closed and torn down; a live one
//! has its flag cleared and gets a fresh probe. A channel that never
//! answers is therefore reclaimed within two sweep intervals.

use crate::state::AppState;
use crate::ws;
use beacon_core::Outbound;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn the periodic sweep task.
pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_millis(state.config.heartbeat.interval_ms);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so connections get
        // a full interval before their first probe.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&state).await;
        }
    })
}

/// One liveness sweep over every open channel.
///
/// The seat list is snapshotted up front so no registry shard lock is held
/// across an await point; eviction teardown runs synchronously with the
/// sweep.
pub(crate) async fn sweep(state: &AppState) {
    let seats = state.registry.seat_snapshot();
    debug!(connections = seats.len(), "Heartbeat sweep");

    for seat in seats {
        if seat.alive.swap(false, Ordering::Relaxed) {
            // Alive since the last sweep: clear the flag and probe again.
            let _ = seat.sender.send(Outbound::Ping);
        } else {
            debug!(connection = %seat.conn_id, "Heartbeat eviction");
            let _ = seat.sender.send(Outbound::Close);
            ws::teardown(state, &seat.conn_id, seat.user_id.as_ref()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live;
    use crate::testutil::{connect_user, drain, recv_event, test_state};
    use beacon_protocol::ServerEvent;
    use beacon_store::entities::Role;

    #[tokio::test]
    async fn responsive_channels_are_probed_not_evicted() {
        let state = test_state();
        let (session, mut rx) = connect_user(&state, "alice", Role::Viewer, "c1");

        sweep(&state).await;
        assert!(matches!(rx.try_recv(), Ok(Outbound::Ping)));
        assert!(state.registry.is_online(&"alice".to_string()));

        // The pong re-arms the flag; the next sweep probes again.
        session.alive.store(true, Ordering::Relaxed);
        sweep(&state).await;
        assert!(matches!(rx.try_recv(), Ok(Outbound::Ping)));
        assert!(state.registry.is_online(&"alice".to_string()));
    }

    #[tokio::test]
    async fn two_silent_sweeps_evict_and_reclaim_everything() {
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

        // First silent sweep: both probed, nobody evicted. The host pongs,
        // the viewer stays silent.
        sweep(&state).await;
        host.alive.store(true, Ordering::Relaxed);

        // Second sweep: the viewer's flag is still clear, so it is evicted
        // and its state reclaimed.
        sweep(&state).await;

        assert!(!state.registry.is_online(&"v".to_string()));
        assert!(!state.rooms.is_member(&room_id, &"v".to_string()));
        assert!(!state
            .store
            .current_participants(&room_id)
            .await
            .unwrap()
            .iter()
            .any(|p| p.user_id == "v"));

        // The viewer's channel was told to close.
        let closed = drain_raw(&mut viewer_rx);
        assert!(closed, "viewer channel should receive Close");

        // Former room peers hear the departure.
        let host_events = drain(&mut host_rx);
        assert!(host_events
            .iter()
            .any(|e| matches!(e, ServerEvent::UserLeftLive { data } if data.user_id == "v")));
        assert!(host_events
            .iter()
            .any(|e| matches!(e, ServerEvent::UserStatus { data } if data.user_id == "v" && !data.is_online)));
    }

    fn drain_raw(rx: &mut beacon_core::OutboundReceiver) -> bool {
        let mut saw_close = false;
        while let Ok(frame) = rx.try_recv() {
            if matches!(frame, Outbound::Close) {
                saw_close = true;
            }
        }
        saw_close
    }
}
