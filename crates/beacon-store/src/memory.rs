//! In-memory reference implementation of [`RecordStore`].
//!
//! Backed by sharded concurrent maps; used by the server binary default
//! and by tests as a stand-in for a real database.

use crate::entities::{
    new_id, now_millis, ChatMessage, CurrentParticipant, GroupRoom, LiveSession, PrivateRoom,
    Role, RoomId, TotalParticipant, User, UserId, UserProfile,
};
use crate::store::{
    ConversationKind, ConversationSummary, GroupSummary, NewMessage, RecordStore, StoreError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Canonical key for an unordered user pair.
fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}\u{1}{b}")
    } else {
        format!("{b}\u{1}{a}")
    }
}

/// DashMap-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    /// Canonical pair key -> private room. Guarantees one room per pair.
    private_pairs: DashMap<String, PrivateRoom>,
    groups: DashMap<RoomId, GroupRoom>,
    /// Room id -> messages in creation order (oldest first).
    messages: DashMap<RoomId, Vec<ChatMessage>>,
    sessions: DashMap<RoomId, LiveSession>,
    current: DashMap<RoomId, Vec<CurrentParticipant>>,
    total: DashMap<RoomId, Vec<TotalParticipant>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).map(|u| UserProfile::from(u.value()))
    }

    fn last_message(&self, room_id: &str) -> Option<ChatMessage> {
        self.messages
            .get(room_id)
            .and_then(|msgs| msgs.last().cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<PrivateRoom>, StoreError> {
        Ok(self
            .private_pairs
            .get(&pair_key(a, b))
            .map(|room| room.value().clone()))
    }

    async fn find_or_create_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<PrivateRoom, StoreError> {
        let room = self
            .private_pairs
            .entry(pair_key(a, b))
            .or_insert_with(|| {
                debug!(user_a = %a, user_b = %b, "Creating private room");
                PrivateRoom {
                    id: new_id(),
                    user_a: a.clone(),
                    user_b: b.clone(),
                    created_at: now_millis(),
                }
            })
            .value()
            .clone();
        Ok(room)
    }

    async fn create_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError> {
        let message = ChatMessage {
            id: new_id(),
            room_id: new.room_id.clone(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            body: new.body,
            timer_id: new.timer_id,
            is_read: false,
            created_at: now_millis(),
        };
        self.messages
            .entry(new.room_id.clone())
            .or_default()
            .push(message.clone());
        // Group recency drives conversation ordering.
        if let Some(mut group) = self.groups.get_mut(&new.room_id) {
            group.updated_at = message.created_at;
        }
        Ok(message)
    }

    async fn messages_for_room(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .messages
            .get(room_id)
            .map(|msgs| msgs.value().clone())
            .unwrap_or_default())
    }

    async fn mark_read(&self, room_id: &RoomId, receiver_id: &UserId) -> Result<u64, StoreError> {
        let mut flipped = 0;
        if let Some(mut msgs) = self.messages.get_mut(room_id) {
            for msg in msgs.iter_mut() {
                if !msg.is_read && msg.receiver_id.as_deref() == Some(receiver_id.as_str()) {
                    msg.is_read = true;
                    flipped += 1;
                }
            }
        }
        Ok(flipped)
    }

    async fn unread_messages(
        &self,
        room_id: &RoomId,
        receiver_id: &UserId,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .messages
            .get(room_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| {
                        !m.is_read && m.receiver_id.as_deref() == Some(receiver_id.as_str())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn conversations_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut entries: Vec<(u64, ConversationSummary)> = Vec::new();

        for room in self.private_pairs.iter() {
            let Some(counterpart) = room.counterpart(user_id) else {
                continue;
            };
            let last = self.last_message(&room.id);
            let recency = last.as_ref().map_or(room.created_at, |m| m.created_at);
            entries.push((
                recency,
                ConversationSummary {
                    kind: ConversationKind::Private,
                    room_id: room.id.clone(),
                    user: self.profile(counterpart),
                    name: None,
                    last_message: last,
                },
            ));
        }

        for group in self.groups.iter() {
            if !group.has_member(user_id) {
                continue;
            }
            let last = self.last_message(&group.id);
            let recency = last.as_ref().map_or(group.updated_at, |m| m.created_at);
            entries.push((
                recency,
                ConversationSummary {
                    kind: ConversationKind::Group,
                    room_id: group.id.clone(),
                    user: None,
                    name: group.name.clone(),
                    last_message: last,
                },
            ));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, summary)| summary).collect())
    }

    async fn create_group_room(
        &self,
        name: Option<String>,
        member_ids: Vec<UserId>,
    ) -> Result<GroupRoom, StoreError> {
        let mut members = member_ids;
        members.dedup();
        let now = now_millis();
        let group = GroupRoom {
            id: new_id(),
            name,
            member_ids: members,
            created_at: now,
            updated_at: now,
        };
        self.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn group_room(&self, room_id: &RoomId) -> Result<Option<GroupRoom>, StoreError> {
        Ok(self.groups.get(room_id).map(|group| group.value().clone()))
    }

    async fn is_group_member(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .groups
            .get(room_id)
            .is_some_and(|g| g.has_member(user_id)))
    }

    async fn group_members(&self, room_id: &RoomId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .groups
            .get(room_id)
            .map(|g| g.member_ids.clone())
            .unwrap_or_default())
    }

    async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupSummary>, StoreError> {
        let mut groups: Vec<GroupRoom> = self
            .groups
            .iter()
            .filter(|group| group.has_member(user_id))
            .map(|group| group.value().clone())
            .collect();
        groups.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(groups
            .into_iter()
            .map(|g| GroupSummary {
                last_message: self.last_message(&g.id),
                members: g
                    .member_ids
                    .iter()
                    .filter_map(|m| self.profile(m))
                    .collect(),
                room_id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn create_live_session(
        &self,
        author_id: &UserId,
        title: String,
        description: String,
    ) -> Result<LiveSession, StoreError> {
        let session = LiveSession {
            id: new_id(),
            author_id: author_id.clone(),
            title,
            description,
            is_live: true,
            started_at: now_millis(),
            ended_at: None,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn live_session(&self, session_id: &RoomId) -> Result<Option<LiveSession>, StoreError> {
        Ok(self.sessions.get(session_id).map(|row| row.value().clone()))
    }

    async fn end_live_session(&self, session_id: &RoomId) -> Result<LiveSession, StoreError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("live session {session_id}")))?;
        session.is_live = false;
        session.ended_at = Some(now_millis());
        Ok(session.clone())
    }

    async fn add_current_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError> {
        let mut rows = self.current.entry(session_id.clone()).or_default();
        if rows.iter().any(|p| p.user_id == *user_id) {
            return Ok(false);
        }
        rows.push(CurrentParticipant {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            joined_at: now_millis(),
        });
        Ok(true)
    }

    async fn remove_current_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError> {
        let Some(mut rows) = self.current.get_mut(session_id) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|p| p.user_id != *user_id);
        Ok(rows.len() < before)
    }

    async fn clear_current_participants(&self, session_id: &RoomId) -> Result<u64, StoreError> {
        Ok(self
            .current
            .remove(session_id)
            .map_or(0, |(_, rows)| rows.len() as u64))
    }

    async fn current_participants(
        &self,
        session_id: &RoomId,
    ) -> Result<Vec<CurrentParticipant>, StoreError> {
        Ok(self
            .current
            .get(session_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }

    async fn add_total_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError> {
        let mut rows = self.total.entry(session_id.clone()).or_default();
        if rows.iter().any(|p| p.user_id == *user_id) {
            return Ok(false);
        }
        rows.push(TotalParticipant {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            joined_at: now_millis(),
        });
        Ok(true)
    }

    async fn total_participants(
        &self,
        session_id: &RoomId,
    ) -> Result<Vec<TotalParticipant>, StoreError> {
        Ok(self
            .total
            .get(session_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }

    async fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|user| user.value().clone()))
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|user| user.value().clone()))
            .collect())
    }

    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .filter(|user| user.role == role)
            .map(|user| user.value().clone())
            .collect())
    }

    async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        self.users.insert(user.id.clone(), user);
        Ok(())
    }
}
