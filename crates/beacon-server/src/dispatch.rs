//! The message router.
//!
//! Decodes each inbound frame, enforces the authenticate-first
//! precondition once, dispatches to the handler for the event kind, and
//! converts handler failures into error replies on the triggering channel.
//! No failure here ever closes the channel or touches other channels.

use crate::state::AppState;
use crate::{auth, chat, group, live, metrics};
use beacon_core::{ConnectionId, ConnectionSeat, HubError, Identity, Outbound, OutboundSender};
use beacon_protocol::{decode_client, ClientEvent, ServerEvent};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-channel mutable state carried through the read loop.
pub struct Session {
    pub conn_id: ConnectionId,
    pub path: String,
    pub alive: Arc<AtomicBool>,
    pub sender: OutboundSender,
    /// Set once `authenticate` succeeds.
    pub identity: Option<Identity>,
}

impl Session {
    /// Build the session for a freshly registered seat.
    #[must_use]
    pub fn for_seat(seat: &ConnectionSeat) -> Self {
        Self {
            conn_id: seat.conn_id.clone(),
            path: seat.path.clone(),
            alive: seat.alive.clone(),
            sender: seat.sender.clone(),
            identity: None,
        }
    }

    /// Queue a reply on this channel. Best-effort: a closed channel is not
    /// an error.
    pub fn reply(&self, event: ServerEvent) {
        let _ = self.sender.send(Outbound::Event(event));
    }

    /// The authenticated identity, or the authorization error every gated
    /// handler reports.
    pub fn identity(&self) -> Result<&Identity, HubError> {
        self.identity
            .as_ref()
            .ok_or_else(|| HubError::authorization("Authenticate first"))
    }
}

/// Handle one inbound text frame, start to finish.
pub async fn handle_frame(state: &AppState, session: &mut Session, raw: &str) {
    metrics::record_frame("inbound");

    if raw.len() > state.config.limits.max_message_size {
        debug!(connection = %session.conn_id, size = raw.len(), "Oversized frame");
        metrics::record_handler_error("protocol");
        session.reply(ServerEvent::error("Message too large"));
        return;
    }

    let event = match decode_client(raw) {
        Ok(event) => event,
        Err(err) => {
            debug!(connection = %session.conn_id, error = ?err, "Frame rejected");
            metrics::record_handler_error("protocol");
            session.reply(ServerEvent::error(err.to_string()));
            return;
        }
    };

    // The authenticate-first precondition, enforced once for every gated
    // event rather than per handler.
    if session.identity.is_none() && !matches!(event, ClientEvent::Authenticate { .. }) {
        metrics::record_handler_error("authorization");
        session.reply(ServerEvent::error("Authenticate first"));
        return;
    }

    let name = event.name();
    if let Err(err) = dispatch(state, session, event).await {
        warn!(
            connection = %session.conn_id,
            event = name,
            kind = err.kind(),
            error = %err,
            "Handler failed"
        );
        metrics::record_handler_error(err.kind());
        session.reply(ServerEvent::error(err.to_string()));
    }
}

async fn dispatch(
    state: &AppState,
    session: &mut Session,
    event: ClientEvent,
) -> Result<(), HubError> {
    match event {
        ClientEvent::Authenticate { token } => auth::authenticate(state, session, token).await,
        ClientEvent::Message {
            receiver_id,
            message,
            timer_id,
        } => chat::send_direct(state, session, receiver_id, message, timer_id).await,
        ClientEvent::FetchChats { receiver_id } => {
            chat::fetch_chats(state, session, receiver_id).await
        }
        ClientEvent::UnReadMessages { receiver_id } => {
            chat::unread_messages(state, session, receiver_id).await
        }
        ClientEvent::OnlineUsers => chat::online_users(state, session).await,
        ClientEvent::MessageList => chat::message_list(state, session).await,
        ClientEvent::GroupMessage { room_id, message } => {
            group::send(state, session, room_id, message).await
        }
        ClientEvent::FetchGroupChats { room_id } => group::fetch(state, session, room_id).await,
        ClientEvent::GroupList => group::list(state, session).await,
        ClientEvent::StartLive { title, description } => {
            live::start(state, session, title, description).await
        }
        ClientEvent::JoinLive { room_id } => live::join(state, session, room_id).await,
        ClientEvent::LeaveLive { room_id } => live::leave(state, session, room_id).await,
        ClientEvent::EndLive { room_id } => live::end(state, session, room_id).await,
        ClientEvent::LiveOffer { room_id, offer } => {
            live::relay_offer(state, session, room_id, offer).await
        }
        ClientEvent::LiveAnswer { room_id, answer } => {
            live::relay_answer(state, session, room_id, answer).await
        }
        ClientEvent::LiveIce { room_id, candidate } => {
            live::relay_ice(state, session, room_id, candidate).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{connect_user, drain, issue, recv_event, test_state, unauthenticated_session};
    use beacon_store::entities::Role;

    #[tokio::test]
    async fn invalid_json_gets_a_non_fatal_reply() {
        let state = test_state();
        let (mut session, mut rx) = unauthenticated_session(&state, "c1");

        handle_frame(&state, &mut session, "{{nope").await;

        assert!(matches!(
            recv_event(&mut rx),
            ServerEvent::Error { message } if message == "Invalid JSON"
        ));
        // The channel is still usable: decode errors never close it.
        assert!(!session.sender.is_closed());
    }

    #[tokio::test]
    async fn unknown_events_get_a_generic_error() {
        let state = test_state();
        let (mut session, mut rx) = unauthenticated_session(&state, "c1");

        handle_frame(&state, &mut session, r#"{"event":"teleport"}"#).await;

        assert!(matches!(
            recv_event(&mut rx),
            ServerEvent::Error { message } if message == "Unknown event"
        ));
    }

    #[tokio::test]
    async fn gated_events_require_authentication() {
        let state = test_state();
        let (mut session, mut rx) = unauthenticated_session(&state, "c1");

        handle_frame(
            &state,
            &mut session,
            r#"{"event":"message","receiverId":"bob","message":"hi"}"#,
        )
        .await;

        assert!(matches!(
            recv_event(&mut rx),
            ServerEvent::Error { message } if message == "Authenticate first"
        ));
        // And no state changed: nothing was persisted for the pair.
        assert!(state
            .store
            .find_private_room(&"bob".to_string(), &"alice".to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let state = test_state();
        let (mut session, mut rx) = unauthenticated_session(&state, "c1");

        let huge = format!(
            r#"{{"event":"message","receiverId":"bob","message":"{}"}}"#,
            "x".repeat(state.config.limits.max_message_size)
        );
        handle_frame(&state, &mut session, &huge).await;

        assert!(matches!(
            recv_event(&mut rx),
            ServerEvent::Error { message } if message == "Message too large"
        ));
    }

    #[tokio::test]
    async fn authenticate_then_message_end_to_end() {
        let state = test_state();

        // Bob is already connected and authenticated.
        let (_bob_session, mut bob_rx) = connect_user(&state, "bob", Role::Viewer, "c-bob");

        let (mut alice, mut alice_rx) = unauthenticated_session(&state, "c-alice");
        let token = issue("test-secret", "alice", Role::Viewer);
        handle_frame(
            &state,
            &mut alice,
            &format!(r#"{{"event":"authenticate","token":"{token}"}}"#),
        )
        .await;
        assert!(alice.identity.is_some());
        drain(&mut alice_rx);
        drain(&mut bob_rx); // presence broadcast

        // First message creates the pair room, persists, delivers, echoes.
        handle_frame(
            &state,
            &mut alice,
            r#"{"event":"message","receiverId":"bob","message":"hi"}"#,
        )
        .await;

        let room = state
            .store
            .find_private_room(&"alice".to_string(), &"bob".to_string())
            .await
            .unwrap()
            .expect("room created on first message");
        let history = state.store.messages_for_room(&room.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "hi");

        let delivered = recv_event(&mut bob_rx);
        let echoed = recv_event(&mut alice_rx);
        match (&delivered, &echoed) {
            (ServerEvent::Message { data: to_bob }, ServerEvent::Message { data: to_alice }) => {
                // Client and store agree on the canonical record.
                assert_eq!(to_bob, to_alice);
                assert_eq!(to_bob.id, history[0].id);
                assert_eq!(to_bob.body, "hi");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_marks_read_and_unread_count_drops_to_zero() {
        let state = test_state();
        let (mut alice, mut alice_rx) = connect_user(&state, "alice", Role::Viewer, "c1");
        let (mut bob, mut bob_rx) = connect_user(&state, "bob", Role::Viewer, "c2");

        for body in ["one", "two"] {
            handle_frame(
                &state,
                &mut bob,
                &format!(r#"{{"event":"message","receiverId":"alice","message":"{body}"}}"#),
            )
            .await;
        }
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        // Alice fetches: oldest first, and her copies flip to read.
        handle_frame(&state, &mut alice, r#"{"event":"fetchChats","receiverId":"bob"}"#).await;
        match recv_event(&mut alice_rx) {
            ServerEvent::FetchChats { data } => {
                assert_eq!(
                    data.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
                    vec!["one", "two"]
                );
            }
            other => panic!("unexpected: {other:?}"),
        }

        handle_frame(
            &state,
            &mut alice,
            r#"{"event":"unReadMessages","receiverId":"bob"}"#,
        )
        .await;
        match recv_event(&mut alice_rx) {
            ServerEvent::UnReadMessages { data } => {
                assert_eq!(data.count, 0);
                assert!(data.messages.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
