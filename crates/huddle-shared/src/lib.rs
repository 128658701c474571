//! Identifiers, wire protocol and key conventions shared by every Huddle crate.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{
    BusEvent, ClientEvent, FriendAcceptEvent, FriendRequestEvent, MessageRecord, ServerEvent,
    Topic,
};
pub use types::{ConversationKey, UserId};
