//! Live-session lifecycle and signaling relay.
//!
//! A session moves absent -> live -> ended, one way. The ephemeral room in
//! the directory tracks who is present right now; the durable store keeps
//! the current- and total-participant rows. Signaling gates on the
//! directory, not the store — membership there must be fast, and a looser
//! eventually-reconciled view is acceptable.

use crate::dispatch::Session;
use crate::metrics;
use crate::state::AppState;
use beacon_core::HubError;
use beacon_protocol::{AnswerData, IceData, LiveStartedData, OfferData, ServerEvent};
use beacon_store::entities::{RoomId, UserId};
use serde_json::Value;
use tracing::{debug, info};

/// Handle `startLive`. Role-gated to hosts.
pub async fn start(
    state: &AppState,
    session: &Session,
    title: Option<String>,
    description: Option<String>,
) -> Result<(), HubError> {
    let identity = session.identity()?.clone();
    if !identity.role.can_host_live() {
        return Err(HubError::authorization("Only a host can start a live session"));
    }

    let live = state
        .store
        .create_live_session(
            &identity.user_id,
            title.unwrap_or_default(),
            description.unwrap_or_default(),
        )
        .await?;

    // The host is the first current and total participant.
    state
        .store
        .add_current_participant(&identity.user_id, &live.id)
        .await?;
    state
        .store
        .add_total_participant(&identity.user_id, &live.id)
        .await?;

    state.rooms.seed(live.id.clone(), &identity.user_id);
    metrics::set_active_rooms(state.rooms.room_count());
    info!(session_id = %live.id, host = %identity.user_id, "Live session started");

    // Best-effort push to everyone of the complementary role; failures are
    // logged and ignored.
    match state.store.users_by_role(identity.role.complement()).await {
        Ok(audience) => {
            for user in audience {
                let Some(token) = user.push_token.as_deref() else {
                    continue;
                };
                if let Err(err) = state
                    .notifier
                    .send(token, "Live Session Started", &live.title, &user.id)
                    .await
                {
                    debug!(user = %user.id, error = %err, "Push notification failed");
                }
            }
        }
        Err(err) => debug!(error = %err, "Audience lookup for notifications failed"),
    }

    session.reply(ServerEvent::LiveStarted {
        data: LiveStartedData {
            room_id: live.id,
            title: live.title,
        },
    });
    Ok(())
}

/// Handle `joinLive`. The session must exist and still be live.
pub async fn join(state: &AppState, session: &Session, room_id: RoomId) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();

    match state.store.live_session(&room_id).await? {
        Some(row) if row.is_live => {}
        _ => return Err(HubError::not_found("Live not found")),
    }

    state.rooms.join(&room_id, &user_id);
    state.store.add_current_participant(&user_id, &room_id).await?;
    state.store.add_total_participant(&user_id, &room_id).await?;

    session.reply(ServerEvent::joined_live(room_id.clone()));
    let delivered = state.rooms.broadcast(
        &state.registry,
        &room_id,
        &ServerEvent::user_joined_live(user_id.clone(), room_id.clone()),
        Some(&user_id),
    );
    metrics::record_broadcast(delivered);
    Ok(())
}

/// Handle `leaveLive`. Total-participant rows are historical and untouched.
pub async fn leave(state: &AppState, session: &Session, room_id: RoomId) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();

    state.rooms.leave(&room_id, &user_id);
    state
        .store
        .remove_current_participant(&user_id, &room_id)
        .await?;

    session.reply(ServerEvent::left_live(room_id.clone()));
    let delivered = state.rooms.broadcast(
        &state.registry,
        &room_id,
        &ServerEvent::user_left_live(user_id.clone(), room_id.clone()),
        Some(&user_id),
    );
    metrics::record_broadcast(delivered);
    metrics::set_active_rooms(state.rooms.room_count());
    Ok(())
}

/// Handle `endLive`. Author-gated and terminal: the flag flips once, every
/// current-participant row goes, and the ephemeral room is dropped.
pub async fn end(state: &AppState, session: &Session, room_id: RoomId) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();

    let row = state
        .store
        .live_session(&room_id)
        .await?
        .ok_or_else(|| HubError::not_found("Live not found"))?;
    if row.author_id != user_id {
        return Err(HubError::authorization("Only the author can end a live session"));
    }
    if !row.is_live {
        return Err(HubError::not_found("Live already ended"));
    }

    state.store.end_live_session(&room_id).await?;
    state.store.clear_current_participants(&room_id).await?;

    // Drop the room, then tell its former members.
    let members = state.rooms.remove_room(&room_id);
    metrics::set_active_rooms(state.rooms.room_count());
    info!(session_id = %room_id, author = %user_id, "Live session ended");

    session.reply(ServerEvent::live_ended(room_id.clone()));
    let mut delivered = 0;
    for member in members {
        if member == user_id {
            continue;
        }
        if state
            .registry
            .send_to(&member, ServerEvent::live_ended(room_id.clone()))
        {
            delivered += 1;
        }
    }
    metrics::record_broadcast(delivered);
    Ok(())
}

/// Gate shared by the three signaling kinds: the caller must be present in
/// the ephemeral room right now.
fn assert_present(state: &AppState, room_id: &RoomId, user_id: &UserId) -> Result<(), HubError> {
    if state.rooms.is_member(room_id, user_id) {
        Ok(())
    } else {
        Err(HubError::authorization("Join room first"))
    }
}

fn relay(state: &AppState, room_id: &RoomId, user_id: &UserId, event: ServerEvent) {
    let delivered = state
        .rooms
        .broadcast(&state.registry, room_id, &event, Some(user_id));
    metrics::record_broadcast(delivered);
}

/// Relay a WebRTC offer verbatim to the room's other members.
pub async fn relay_offer(
    state: &AppState,
    session: &Session,
    room_id: RoomId,
    offer: Value,
) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();
    assert_present(state, &room_id, &user_id)?;
    relay(
        state,
        &room_id,
        &user_id,
        ServerEvent::LiveOffer {
            data: OfferData {
                from_user_id: user_id.clone(),
                room_id: room_id.clone(),
                offer,
            },
        },
    );
    Ok(())
}

/// Relay a WebRTC answer verbatim to the room's other members.
pub async fn relay_answer(
    state: &AppState,
    session: &Session,
    room_id: RoomId,
    answer: Value,
) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();
    assert_present(state, &room_id, &user_id)?;
    relay(
        state,
        &room_id,
        &user_id,
        ServerEvent::LiveAnswer {
            data: AnswerData {
                from_user_id: user_id.clone(),
                room_id: room_id.clone(),
                answer,
            },
        },
    );
    Ok(())
}

/// Relay an ICE candidate verbatim to the room's other members.
pub async fn relay_ice(
    state: &AppState,
    session: &Session,
    room_id: RoomId,
    candidate: Value,
) -> Result<(), HubError> {
    let user_id = session.identity()?.user_id.clone();
    assert_present(state, &room_id, &user_id)?;
    relay(
        state,
        &room_id,
        &user_id,
        ServerEvent::LiveIce {
            data: IceData {
                from_user_id: user_id.clone(),
                room_id: room_id.clone(),
                candidate,
            },
        },
    );
    Ok(())
}
