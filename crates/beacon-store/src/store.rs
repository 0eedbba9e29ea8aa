//! The record-store contract consumed by the hub.
//!
//! One method per durable operation the realtime core performs. The hub
//! adds no retry layer of its own: implementations surface failures as
//! [`StoreError`] and the dispatcher reports them on the triggering channel.

use crate::entities::{
    ChatMessage, CurrentParticipant, GroupRoom, LiveSession, PrivateRoom, Role, RoomId,
    TotalParticipant, User, UserId, UserProfile,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Write conflicts with an existing record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend unavailable or operation timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Input for creating a chat message. The store stamps id and timestamp,
/// which is why senders echo the returned row rather than their input.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub body: String,
    pub timer_id: Option<String>,
}

/// Discriminates conversation-list entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

/// One entry of the unified conversation list: a room the user belongs to,
/// its counterpart (private) or name (group), and the latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub kind: ConversationKind,
    pub room_id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<ChatMessage>,
}

/// A group room with member profiles and its latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub room_id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub members: Vec<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<ChatMessage>,
}

/// Durable operations the hub consumes.
///
/// Private-room resolution is order-independent: `(a, b)` and `(b, a)`
/// address the same row, and `find_or_create` is idempotent.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Private rooms
    async fn find_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<PrivateRoom>, StoreError>;
    async fn find_or_create_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<PrivateRoom, StoreError>;

    // Chat messages
    async fn create_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError>;
    /// All messages for a room, oldest first.
    async fn messages_for_room(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError>;
    /// Mark every message in the room addressed to `receiver_id` as read.
    /// Returns the number of rows flipped.
    async fn mark_read(&self, room_id: &RoomId, receiver_id: &UserId) -> Result<u64, StoreError>;
    async fn unread_messages(
        &self,
        room_id: &RoomId,
        receiver_id: &UserId,
    ) -> Result<Vec<ChatMessage>, StoreError>;
    /// Every private and group room the user belongs to, paired with its
    /// most recent message, ordered by room recency (newest first).
    async fn conversations_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, StoreError>;

    // Group rooms
    async fn create_group_room(
        &self,
        name: Option<String>,
        member_ids: Vec<UserId>,
    ) -> Result<GroupRoom, StoreError>;
    async fn group_room(&self, room_id: &RoomId) -> Result<Option<GroupRoom>, StoreError>;
    async fn is_group_member(&self, room_id: &RoomId, user_id: &UserId)
        -> Result<bool, StoreError>;
    async fn group_members(&self, room_id: &RoomId) -> Result<Vec<UserId>, StoreError>;
    async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupSummary>, StoreError>;

    // Live sessions
    async fn create_live_session(
        &self,
        author_id: &UserId,
        title: String,
        description: String,
    ) -> Result<LiveSession, StoreError>;
    async fn live_session(&self, session_id: &RoomId) -> Result<Option<LiveSession>, StoreError>;
    /// Flip `isLive` to false and stamp the end time. Errors if the row is
    /// missing; the caller gates on author and liveness first.
    async fn end_live_session(&self, session_id: &RoomId) -> Result<LiveSession, StoreError>;

    // Participants
    /// Insert a current-participant row unless one exists. Returns whether
    /// a row was inserted.
    async fn add_current_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError>;
    async fn remove_current_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError>;
    /// Delete every current-participant row for the session (on end).
    async fn clear_current_participants(&self, session_id: &RoomId) -> Result<u64, StoreError>;
    async fn current_participants(
        &self,
        session_id: &RoomId,
    ) -> Result<Vec<CurrentParticipant>, StoreError>;
    /// Insert a total-participant row unless one exists. Total rows are
    /// historical and never deleted.
    async fn add_total_participant(
        &self,
        user_id: &UserId,
        session_id: &RoomId,
    ) -> Result<bool, StoreError>;
    async fn total_participants(
        &self,
        session_id: &RoomId,
    ) -> Result<Vec<TotalParticipant>, StoreError>;

    // Users
    async fn user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;
    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
    async fn upsert_user(&self, user: User) -> Result<(), StoreError>;
}
