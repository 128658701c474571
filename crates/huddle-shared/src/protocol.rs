use serde::{Deserialize, Serialize};

use crate::constants::{ACCEPTED_SEPARATOR, TOPIC_FRIENDS, TOPIC_FRIEND_REQUESTS, TOPIC_MESSAGES};
use crate::error::ProtocolError;
use crate::types::UserId;

/// Logical channels of the fanout bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Messages,
    FriendRequests,
    Friends,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Messages, Topic::FriendRequests, Topic::Friends];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Messages => TOPIC_MESSAGES,
            Topic::FriendRequests => TOPIC_FRIEND_REQUESTS,
            Topic::Friends => TOPIC_FRIENDS,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ProtocolError> {
        match name {
            TOPIC_MESSAGES => Ok(Topic::Messages),
            TOPIC_FRIEND_REQUESTS => Ok(Topic::FriendRequests),
            TOPIC_FRIENDS => Ok(Topic::Friends),
            other => Err(ProtocolError::UnknownTopic(other.to_string())),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A direct message between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message: String,
    /// Recipient
    #[serde(rename = "partnerID")]
    pub partner_id: UserId,
    /// Sender
    #[serde(rename = "userID")]
    pub user_id: UserId,
    /// Publisher-supplied ordering key (milliseconds)
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestEvent {
    pub from: UserId,
    pub to: UserId,
}

/// `acceptor` accepted a friend request previously sent by `sender`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendAcceptEvent {
    pub acceptor: UserId,
    pub sender: UserId,
}

impl FriendAcceptEvent {
    /// Decode either the JSON form or the legacy `acceptor:accepted:sender`
    /// string still emitted by the friend-acceptance routes.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let trimmed = payload.trim();
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }

        match trimmed.split_once(ACCEPTED_SEPARATOR) {
            Some((acceptor, sender)) if !acceptor.is_empty() && !sender.is_empty() => Ok(Self {
                acceptor: UserId::from(acceptor),
                sender: UserId::from(sender),
            }),
            _ => Err(ProtocolError::MalformedAcceptance(payload.to_string())),
        }
    }

    pub fn to_legacy_string(&self) -> String {
        format!("{}{ACCEPTED_SEPARATOR}{}", self.acceptor, self.sender)
    }
}

/// A payload travelling on the fanout bus, tagged by its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Message(MessageRecord),
    FriendRequest(FriendRequestEvent),
    FriendAccept(FriendAcceptEvent),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::Message(_) => Topic::Messages,
            BusEvent::FriendRequest(_) => Topic::FriendRequests,
            BusEvent::FriendAccept(_) => Topic::Friends,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let payload = match self {
            BusEvent::Message(record) => serde_json::to_string(record)?,
            BusEvent::FriendRequest(request) => serde_json::to_string(request)?,
            BusEvent::FriendAccept(accept) => serde_json::to_string(accept)?,
        };
        Ok(payload)
    }

    pub fn decode(topic: Topic, payload: &str) -> Result<Self, ProtocolError> {
        match topic {
            Topic::Messages => Ok(BusEvent::Message(serde_json::from_str(payload)?)),
            Topic::FriendRequests => Ok(BusEvent::FriendRequest(serde_json::from_str(payload)?)),
            Topic::Friends => Ok(BusEvent::FriendAccept(FriendAcceptEvent::decode(payload)?)),
        }
    }
}

/// Events a connected client sends to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "event:Message")]
    Message(MessageRecord),
    #[serde(rename = "event:FriendRequests")]
    FriendRequest(FriendRequestEvent),
}

/// Notifications the server pushes to a connected client.
///
/// Profile payloads are passed through exactly as stored under `user:{id}`;
/// `None` when the store has no profile for that user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "online")]
    Online(UserId),
    #[serde(rename = "offline")]
    Offline(UserId),
    #[serde(rename = "message")]
    Message(MessageRecord),
    #[serde(rename = "friendRequest")]
    FriendRequest(Option<String>),
    #[serde(rename = "friendAdd")]
    FriendAdd(Option<String>),
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MessageRecord {
        MessageRecord {
            message: "hi".to_string(),
            partner_id: UserId::from("bob"),
            user_id: UserId::from("alice"),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_message_record_wire_names() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["partnerID"], "bob");
        assert_eq!(json["userID"], "alice");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["message"], "hi");
    }

    #[test]
    fn test_bus_event_topics() {
        let msg = BusEvent::Message(record());
        assert_eq!(msg.topic(), Topic::Messages);

        let encoded = msg.encode().unwrap();
        assert_eq!(BusEvent::decode(Topic::Messages, &encoded).unwrap(), msg);

        let request = BusEvent::FriendRequest(FriendRequestEvent {
            from: UserId::from("a"),
            to: UserId::from("b"),
        });
        assert_eq!(request.topic().as_str(), "FriendRequests");
    }

    #[test]
    fn test_malformed_message_payload() {
        assert!(matches!(
            BusEvent::decode(Topic::Messages, "not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_friend_accept_legacy_string() {
        let event = FriendAcceptEvent::decode("u1:accepted:u2").unwrap();
        assert_eq!(event.acceptor, UserId::from("u1"));
        assert_eq!(event.sender, UserId::from("u2"));
        assert_eq!(event.to_legacy_string(), "u1:accepted:u2");
    }

    #[test]
    fn test_friend_accept_json() {
        let event = FriendAcceptEvent::decode(r#"{"acceptor":"u1","sender":"u2"}"#).unwrap();
        assert_eq!(event.acceptor.as_str(), "u1");
        assert_eq!(event.sender.as_str(), "u2");
    }

    #[test]
    fn test_friend_accept_rejects_garbage() {
        assert!(FriendAcceptEvent::decode("u1:rejected:u2").is_err());
        assert!(FriendAcceptEvent::decode(":accepted:u2").is_err());
    }

    #[test]
    fn test_topic_names() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.as_str()).unwrap(), topic);
        }
        assert!(Topic::from_name("messages").is_err());
    }

    #[test]
    fn test_client_event_shape() {
        let text = r#"{"event":"event:FriendRequests","data":{"from":"a","to":"b"}}"#;
        let event = ClientEvent::from_json(text).unwrap();
        assert_eq!(
            event,
            ClientEvent::FriendRequest(FriendRequestEvent {
                from: UserId::from("a"),
                to: UserId::from("b"),
            })
        );
    }

    #[test]
    fn test_server_event_shape() {
        let json = ServerEvent::Online(UserId::from("bob")).to_json().unwrap();
        assert_eq!(json, r#"{"event":"online","data":"bob"}"#);

        let json = ServerEvent::FriendAdd(None).to_json().unwrap();
        assert_eq!(json, r#"{"event":"friendAdd","data":null}"#);
    }
}
