//! # beacon-protocol
//!
//! The JSON wire envelope spoken on every Beacon channel.
//!
//! Every frame, both directions, is an envelope `{event: string, ...}`.
//! Inbound frames decode into [`ClientEvent`]; outbound frames are
//! [`ServerEvent`] values serialized back to the same shape. The decode
//! rules distinguish malformed JSON from unknown events from bad payloads
//! so the dispatcher can reply precisely without ever closing the channel.

pub mod codec;
pub mod events;

pub use codec::{decode_client, encode_server, ProtocolError};
pub use events::{
    AnswerData, AuthenticatedData, ClientEvent, IceData, LiveStartedData, OfferData, RoomRef,
    RoomUser, ServerEvent, UnreadData, UserStatusData,
};
