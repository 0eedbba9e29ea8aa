//! Typed event sums for the wire envelope.
//!
//! The `event` string is the serde tag; payload fields ride alongside it in
//! the same object, camelCase on the wire.

use beacon_store::entities::{ChatMessage, OnlineUser, Role, RoomId, UserId};
use beacon_store::store::{ConversationSummary, GroupSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound events a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Present a bearer token. The only event allowed pre-authentication.
    Authenticate {
        #[serde(default)]
        token: Option<String>,
    },
    /// Send a direct message.
    Message {
        receiver_id: UserId,
        message: String,
        #[serde(default)]
        timer_id: Option<String>,
    },
    /// Fetch direct history with a counterpart; marks received rows read.
    FetchChats { receiver_id: UserId },
    /// Unread direct messages from a counterpart, without marking read.
    UnReadMessages { receiver_id: UserId },
    /// Profiles of everyone currently online.
    OnlineUsers,
    /// Unified conversation list, private and group.
    MessageList,
    /// Send a message to a group room.
    GroupMessage { room_id: RoomId, message: String },
    /// Fetch a group room's history.
    FetchGroupChats { room_id: RoomId },
    /// Groups the caller belongs to.
    GroupList,
    /// Start a live session (host role only).
    StartLive {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// Join a live session.
    JoinLive { room_id: RoomId },
    /// Leave a live session.
    LeaveLive { room_id: RoomId },
    /// End a live session (author only, terminal).
    EndLive { room_id: RoomId },
    /// Relay a WebRTC offer to the room.
    LiveOffer { room_id: RoomId, offer: Value },
    /// Relay a WebRTC answer to the room.
    LiveAnswer { room_id: RoomId, answer: Value },
    /// Relay an ICE candidate to the room.
    LiveIce { room_id: RoomId, candidate: Value },
}

impl ClientEvent {
    /// Whether `tag` names a recognized inbound event.
    #[must_use]
    pub fn is_known(tag: &str) -> bool {
        matches!(
            tag,
            "authenticate"
                | "message"
                | "fetchChats"
                | "unReadMessages"
                | "onlineUsers"
                | "messageList"
                | "groupMessage"
                | "fetchGroupChats"
                | "groupList"
                | "startLive"
                | "joinLive"
                | "leaveLive"
                | "endLive"
                | "liveOffer"
                | "liveAnswer"
                | "liveIce"
        )
    }

    /// The wire name, for logging and metrics labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate { .. } => "authenticate",
            ClientEvent::Message { .. } => "message",
            ClientEvent::FetchChats { .. } => "fetchChats",
            ClientEvent::UnReadMessages { .. } => "unReadMessages",
            ClientEvent::OnlineUsers => "onlineUsers",
            ClientEvent::MessageList => "messageList",
            ClientEvent::GroupMessage { .. } => "groupMessage",
            ClientEvent::FetchGroupChats { .. } => "fetchGroupChats",
            ClientEvent::GroupList => "groupList",
            ClientEvent::StartLive { .. } => "startLive",
            ClientEvent::JoinLive { .. } => "joinLive",
            ClientEvent::LeaveLive { .. } => "leaveLive",
            ClientEvent::EndLive { .. } => "endLive",
            ClientEvent::LiveOffer { .. } => "liveOffer",
            ClientEvent::LiveAnswer { .. } => "liveAnswer",
            ClientEvent::LiveIce { .. } => "liveIce",
        }
    }
}

/// Payload of the `authenticated` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedData {
    pub user_id: UserId,
    pub role: Role,
}

/// Payload of the global presence broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusData {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub is_online: bool,
}

/// Payload of the `unReadMessages` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadData {
    pub messages: Vec<ChatMessage>,
    pub count: usize,
}

/// Payload of the `liveStarted` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStartedData {
    pub room_id: RoomId,
    pub title: String,
}

/// A bare room reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: RoomId,
}

/// A user inside a room, for join/leave broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Relayed offer, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferData {
    pub from_user_id: UserId,
    pub room_id: RoomId,
    pub offer: Value,
}

/// Relayed answer, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerData {
    pub from_user_id: UserId,
    pub room_id: RoomId,
    pub answer: Value,
}

/// Relayed ICE candidate, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceData {
    pub from_user_id: UserId,
    pub room_id: RoomId,
    pub candidate: Value,
}

/// Outbound events: replies to the caller and broadcasts to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    Info { message: String },
    Error { message: String },
    Authenticated { data: AuthenticatedData },
    /// Roster of online hosts, sent to a freshly authenticated viewer.
    ActiveHosts { data: Vec<UserId> },
    /// Roster of online viewers, sent to a freshly authenticated host.
    ActiveViewers { data: Vec<UserId> },
    UserStatus { data: UserStatusData },
    Message { data: ChatMessage },
    FetchChats { data: Vec<ChatMessage> },
    UnReadMessages { data: UnreadData },
    NoUnreadMessages { data: Vec<ChatMessage> },
    OnlineUsers { data: Vec<OnlineUser> },
    MessageList { data: Vec<ConversationSummary> },
    GroupMessage { data: ChatMessage },
    FetchGroupChats { data: Vec<ChatMessage> },
    GroupList { data: Vec<GroupSummary> },
    LiveStarted { data: LiveStartedData },
    JoinedLive { data: RoomRef },
    UserJoinedLive { data: RoomUser },
    LeftLive { data: RoomRef },
    UserLeftLive { data: RoomUser },
    LiveEnded { data: RoomRef },
    LiveOffer { data: OfferData },
    LiveAnswer { data: AnswerData },
    LiveIce { data: IceData },
}

impl ServerEvent {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        ServerEvent::Info {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn authenticated(user_id: impl Into<UserId>, role: Role) -> Self {
        ServerEvent::Authenticated {
            data: AuthenticatedData {
                user_id: user_id.into(),
                role,
            },
        }
    }

    #[must_use]
    pub fn user_status(user_id: impl Into<UserId>, role: Option<Role>, is_online: bool) -> Self {
        ServerEvent::UserStatus {
            data: UserStatusData {
                user_id: user_id.into(),
                role,
                is_online,
            },
        }
    }

    #[must_use]
    pub fn joined_live(room_id: impl Into<RoomId>) -> Self {
        ServerEvent::JoinedLive {
            data: RoomRef {
                room_id: room_id.into(),
            },
        }
    }

    #[must_use]
    pub fn user_joined_live(user_id: impl Into<UserId>, room_id: impl Into<RoomId>) -> Self {
        ServerEvent::UserJoinedLive {
            data: RoomUser {
                user_id: user_id.into(),
                room_id: room_id.into(),
            },
        }
    }

    #[must_use]
    pub fn left_live(room_id: impl Into<RoomId>) -> Self {
        ServerEvent::LeftLive {
            data: RoomRef {
                room_id: room_id.into(),
            },
        }
    }

    #[must_use]
    pub fn user_left_live(user_id: impl Into<UserId>, room_id: impl Into<RoomId>) -> Self {
        ServerEvent::UserLeftLive {
            data: RoomUser {
                user_id: user_id.into(),
                room_id: room_id.into(),
            },
        }
    }

    #[must_use]
    pub fn live_ended(room_id: impl Into<RoomId>) -> Self {
        ServerEvent::LiveEnded {
            data: RoomRef {
                room_id: room_id.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_wire_names() {
        for tag in [
            "authenticate",
            "message",
            "fetchChats",
            "unReadMessages",
            "onlineUsers",
            "messageList",
            "groupMessage",
            "fetchGroupChats",
            "groupList",
            "startLive",
            "joinLive",
            "leaveLive",
            "endLive",
            "liveOffer",
            "liveAnswer",
            "liveIce",
        ] {
            assert!(ClientEvent::is_known(tag), "{tag} should be known");
        }
        assert!(!ClientEvent::is_known("createGroup"));
    }

    #[test]
    fn message_event_round_trip() {
        let raw = json!({
            "event": "message",
            "receiverId": "bob",
            "message": "hi",
            "timerId": "t-9"
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Message {
                receiver_id: "bob".into(),
                message: "hi".into(),
                timer_id: Some("t-9".into()),
            }
        );
        assert_eq!(event.name(), "message");
    }

    #[test]
    fn authenticate_token_is_optional() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "authenticate"})).unwrap();
        assert_eq!(event, ClientEvent::Authenticate { token: None });
    }

    #[test]
    fn server_event_envelope_shape() {
        let frame = ServerEvent::user_status("alice", None, true);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "userStatus");
        assert_eq!(json["data"]["userId"], "alice");
        assert_eq!(json["data"]["isOnline"], true);
        assert!(json["data"].get("role").is_none());
    }

    #[test]
    fn signaling_payload_is_tagged_with_sender() {
        let frame = ServerEvent::LiveOffer {
            data: OfferData {
                from_user_id: "host".into(),
                room_id: "s1".into(),
                offer: json!({"sdp": "v=0"}),
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "liveOffer");
        assert_eq!(json["data"]["fromUserId"], "host");
        assert_eq!(json["data"]["offer"]["sdp"], "v=0");
    }
}
