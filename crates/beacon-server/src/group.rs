//! Group-chat handlers.
//!
//! Same shape as direct messaging, with one extra gate: the caller must be
//! a listed member of the room, and new messages fan out to every member's
//! open channel.

use crate::dispatch::Session;
use crate::metrics;
use crate::state::AppState;
use beacon_core::HubError;
use beacon_protocol::ServerEvent;
use beacon_store::entities::{RoomId, UserId};
use beacon_store::store::NewMessage;

async fn assert_membership(
    state: &AppState,
    room_id: &RoomId,
    user_id: &UserId,
) -> Result<(), HubError> {
    if state.store.is_group_member(room_id, user_id).await? {
        Ok(())
    } else {
        Err(HubError::authorization("Not a member of this group"))
    }
}

/// Handle `groupMessage`: persist and fan out to every member.
pub async fn send(
    state: &AppState,
    session: &Session,
    room_id: RoomId,
    body: String,
) -> Result<(), HubError> {
    let sender_id = session.identity()?.user_id.clone();
    assert_membership(state, &room_id, &sender_id).await?;

    let chat = state
        .store
        .create_message(NewMessage {
            room_id: room_id.clone(),
            sender_id,
            receiver_id: None,
            body,
            timer_id: None,
        })
        .await?;

    // Every member gets the persisted row, the sender's echo included.
    let members = state.store.group_members(&room_id).await?;
    let mut delivered = 0;
    for member in members {
        if state
            .registry
            .send_to(&member, ServerEvent::GroupMessage { data: chat.clone() })
        {
            delivered += 1;
        }
    }
    metrics::record_broadcast(delivered);
    Ok(())
}

/// Handle `fetchGroupChats`: the room's history, oldest first.
pub async fn fetch(
    state: &AppState,
    session: &Session,
    room_id: RoomId,
) -> Result<(), HubError> {
    let requester_id = session.identity()?.user_id.clone();
    assert_membership(state, &room_id, &requester_id).await?;

    let chats = state.store.messages_for_room(&room_id).await?;
    session.reply(ServerEvent::FetchGroupChats { data: chats });
    Ok(())
}

/// Handle `groupList`: groups the caller belongs to, most recent first.
pub async fn list(state: &AppState, session: &Session) -> Result<(), HubError> {
    let requester_id = session.identity()?.user_id.clone();

    let groups = state.store.groups_for(&requester_id).await?;
    session.reply(ServerEvent::GroupList { data: groups });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{connect_user, recv_event, seed_user, test_state};
    use beacon_store::entities::Role;

    #[tokio::test]
    async fn non_members_are_rejected_and_nothing_is_persisted() {
        let state = test_state();
        let group = state
            .store
            .create_group_room(Some("team".into()), vec!["a".into(), "b".into()])
            .await
            .unwrap();
        let (outsider, _rx) = connect_user(&state, "z", Role::Viewer, "c1");

        let err = send(&state, &outsider, group.id.clone(), "hi".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authorization");
        assert_eq!(err.to_string(), "Not a member of this group");
        assert!(state
            .store
            .messages_for_room(&group.id)
            .await
            .unwrap()
            .is_empty());

        let err = fetch(&state, &outsider, group.id.clone()).await.unwrap_err();
        assert_eq!(err.kind(), "authorization");
    }

    #[tokio::test]
    async fn group_message_fans_out_to_every_online_member() {
        let state = test_state();
        let group = state
            .store
            .create_group_room(None, vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();

        let (a, mut a_rx) = connect_user(&state, "a", Role::Viewer, "c1");
        let (_b, mut b_rx) = connect_user(&state, "b", Role::Viewer, "c2");
        // c is a member but offline.

        send(&state, &a, group.id.clone(), "hello group".into())
            .await
            .unwrap();

        for rx in [&mut a_rx, &mut b_rx] {
            assert!(matches!(
                recv_event(rx),
                ServerEvent::GroupMessage { data } if data.body == "hello group"
            ));
        }
        assert_eq!(
            state.store.messages_for_room(&group.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn members_fetch_history_oldest_first() {
        let state = test_state();
        let group = state
            .store
            .create_group_room(None, vec!["a".into(), "b".into()])
            .await
            .unwrap();
        let (a, mut a_rx) = connect_user(&state, "a", Role::Viewer, "c1");

        for body in ["one", "two"] {
            send(&state, &a, group.id.clone(), body.into()).await.unwrap();
        }
        // Drain the fan-out copies before fetching.
        while matches!(
            a_rx.try_recv(),
            Ok(beacon_core::Outbound::Event(ServerEvent::GroupMessage { .. }))
        ) {}

        fetch(&state, &a, group.id.clone()).await.unwrap();
        match recv_event(&mut a_rx) {
            ServerEvent::FetchGroupChats { data } => {
                assert_eq!(
                    data.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
                    vec!["one", "two"]
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_list_returns_memberships_with_profiles() {
        let state = test_state();
        seed_user(&state, "a", Role::Viewer).await;
        seed_user(&state, "b", Role::Viewer).await;
        state
            .store
            .create_group_room(Some("team".into()), vec!["a".into(), "b".into()])
            .await
            .unwrap();
        state
            .store
            .create_group_room(Some("other".into()), vec!["b".into()])
            .await
            .unwrap();

        let (a, mut rx) = connect_user(&state, "a", Role::Viewer, "c1");
        list(&state, &a).await.unwrap();
        match recv_event(&mut rx) {
            ServerEvent::GroupList { data } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].name.as_deref(), Some("team"));
                assert_eq!(data[0].members.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
