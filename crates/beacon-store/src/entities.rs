//! Durable entities exchanged with the record store.
//!
//! Field names serialize in camelCase so rows can be embedded verbatim in
//! wire frames.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A user identity, as carried in tokens and registry keys.
pub type UserId = String;

/// A room identifier — private pair room, group room, or live session.
pub type RoomId = String;

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a fresh durable entity id.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The closed set of user roles.
///
/// Role gates are capability checks on this enum, never string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Privileged role: may start (and end) live sessions.
    Host,
    /// Regular audience role.
    Viewer,
}

impl Role {
    /// The complementary role, used for the post-authentication roster.
    #[must_use]
    pub fn complement(self) -> Role {
        match self {
            Role::Host => Role::Viewer,
            Role::Viewer => Role::Host,
        }
    }

    /// Whether this role may start a live session.
    #[must_use]
    pub fn can_host_live(self) -> bool {
        matches!(self, Role::Host)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// Device token for push notifications, when the user has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Profile projection embedded in conversation and group payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// Projection returned by the online-users roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl From<&User> for OnlineUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// A durable private chat room: one per unordered user pair.
///
/// The store canonicalizes pair order, so `(a, b)` and `(b, a)` resolve to
/// the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateRoom {
    pub id: RoomId,
    pub user_a: UserId,
    pub user_b: UserId,
    pub created_at: u64,
}

impl PrivateRoom {
    /// The pair member that is not `user_id`, if `user_id` belongs to the pair.
    #[must_use]
    pub fn counterpart(&self, user_id: &str) -> Option<&UserId> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }
}

/// A durable group chat room. Membership authorizes send/fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRoom {
    pub id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub member_ids: Vec<UserId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl GroupRoom {
    #[must_use]
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }
}

/// A chat message. Immutable once created, except for the one-way read flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// Set for private messages; group messages address the room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_id: Option<String>,
    pub is_read: bool,
    pub created_at: u64,
}

/// A live broadcast session row.
///
/// Lifecycle is one-way: created live, ended exactly once, then terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    pub id: RoomId,
    pub author_id: UserId,
    pub title: String,
    pub description: String,
    pub is_live: bool,
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
}

/// Present-now membership in a live session. Deleted on leave/end/disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentParticipant {
    pub user_id: UserId,
    pub session_id: RoomId,
    pub joined_at: u64,
}

/// Historical membership in a live session. Inserted once, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalParticipant {
    pub user_id: UserId,
    pub session_id: RoomId,
    pub joined_at: u64,
}
