//! Direct-message handlers.
//!
//! Every durable write goes through the record store; the sender always
//! receives an echo of the persisted row so client and store never
//! disagree on the canonical record (generated id, timestamp).

use crate::dispatch::Session;
use crate::state::AppState;
use beacon_core::HubError;
use beacon_protocol::{ServerEvent, UnreadData};
use beacon_store::entities::{OnlineUser, UserId};
use beacon_store::store::NewMessage;
use tracing::debug;

/// Handle the `message` event: find or create the pair room, persist, and
/// deliver to the receiver's open channel in addition to the durable write.
pub async fn send_direct(
    state: &AppState,
    session: &Session,
    receiver_id: UserId,
    body: String,
    timer_id: Option<String>,
) -> Result<(), HubError> {
    let sender_id = session.identity()?.user_id.clone();

    let room = state
        .store
        .find_or_create_private_room(&sender_id, &receiver_id)
        .await?;

    let chat = state
        .store
        .create_message(NewMessage {
            room_id: room.id,
            sender_id: sender_id.clone(),
            receiver_id: Some(receiver_id.clone()),
            body,
            timer_id,
        })
        .await?;

    if !state
        .registry
        .send_to(&receiver_id, ServerEvent::Message { data: chat.clone() })
    {
        debug!(receiver = %receiver_id, "Receiver offline, message persisted only");
    }
    session.reply(ServerEvent::Message { data: chat });
    Ok(())
}

/// Handle `fetchChats`: full history with the counterpart, oldest first.
/// Marks every message addressed to the requester as read as a side
/// effect.
pub async fn fetch_chats(
    state: &AppState,
    session: &Session,
    counterpart_id: UserId,
) -> Result<(), HubError> {
    let requester_id = session.identity()?.user_id.clone();

    let Some(room) = state
        .store
        .find_private_room(&requester_id, &counterpart_id)
        .await?
    else {
        session.reply(ServerEvent::FetchChats { data: Vec::new() });
        return Ok(());
    };

    let chats = state.store.messages_for_room(&room.id).await?;
    state.store.mark_read(&room.id, &requester_id).await?;

    session.reply(ServerEvent::FetchChats { data: chats });
    Ok(())
}

/// Handle `unReadMessages`: unread rows addressed to the requester plus
/// their count. Does not mark anything read.
pub async fn unread_messages(
    state: &AppState,
    session: &Session,
    counterpart_id: UserId,
) -> Result<(), HubError> {
    let requester_id = session.identity()?.user_id.clone();

    let Some(room) = state
        .store
        .find_private_room(&requester_id, &counterpart_id)
        .await?
    else {
        session.reply(ServerEvent::NoUnreadMessages { data: Vec::new() });
        return Ok(());
    };

    let messages = state.store.unread_messages(&room.id, &requester_id).await?;
    let count = messages.len();
    session.reply(ServerEvent::UnReadMessages {
        data: UnreadData { messages, count },
    });
    Ok(())
}

/// Handle `onlineUsers`: profiles of every currently-online identity.
pub async fn online_users(state: &AppState, session: &Session) -> Result<(), HubError> {
    session.identity()?;

    let ids = state.registry.online_user_ids();
    let users = state.store.users_by_ids(&ids).await?;
    session.reply(ServerEvent::OnlineUsers {
        data: users.iter().map(OnlineUser::from).collect(),
    });
    Ok(())
}

/// Handle `messageList`: the unified conversation list, private and group,
/// ordered by room recency.
pub async fn message_list(state: &AppState, session: &Session) -> Result<(), HubError> {
    let requester_id = session.identity()?.user_id.clone();

    let conversations = state.store.conversations_for(&requester_id).await?;
    session.reply(ServerEvent::MessageList {
        data: conversations,
    });
    Ok(())
}
