//! Events exchanged between clients and the relay.
//!
//! Every event is encoded as `{"event": "<kebab-name>", "data": {...}}` with
//! camelCase payload fields. The `message` field of a chat message is an
//! opaque JSON value the relay forwards without looking inside.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ConnectionId, Profile, Role, RoomId};

/// Events sent by a client to the relay.
///
/// `create-room` and `leave-room` may omit `data` entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateRoom(CreateRoomRequest),
    JoinRoom(JoinRoomRequest),
    SendMessage(SendMessageRequest),
    TypingStart(TypingRequest),
    TypingEnd(TypingRequest),
    LeaveRoom,
}

impl ClientEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "create-room",
            Self::JoinRoom(_) => "join-room",
            Self::SendMessage(_) => "send-message",
            Self::TypingStart(_) => "typing-start",
            Self::TypingEnd(_) => "typing-end",
            Self::LeaveRoom => "leave-room",
        }
    }
}

const CLIENT_EVENT_NAMES: &[&str] = &[
    "create-room",
    "join-room",
    "send-message",
    "typing-start",
    "typing-end",
    "leave-room",
];

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Frame {
            event: String,
            #[serde(default)]
            data: Value,
        }

        fn payload<T: DeserializeOwned, E: de::Error>(data: Value) -> Result<T, E> {
            serde_json::from_value(data).map_err(E::custom)
        }

        let Frame { event, data } = Frame::deserialize(deserializer)?;
        match event.as_str() {
            "create-room" if data.is_null() => Ok(Self::CreateRoom(CreateRoomRequest::default())),
            "create-room" => payload(data).map(Self::CreateRoom),
            "join-room" => payload(data).map(Self::JoinRoom),
            "send-message" => payload(data).map(Self::SendMessage),
            "typing-start" => payload(data).map(Self::TypingStart),
            "typing-end" => payload(data).map(Self::TypingEnd),
            "leave-room" => Ok(Self::LeaveRoom),
            other => Err(de::Error::unknown_variant(other, CLIENT_EVENT_NAMES)),
        }
    }
}

/// Payload of `create-room`.
///
/// Clients may send a full `profile`, a bare `displayName`, or both; an
/// explicit profile name wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub profile: Profile,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CreateRoomRequest {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            display_name: None,
        }
    }

    /// The creator's profile with `displayName` folded in.
    pub fn into_profile(self) -> Profile {
        let mut profile = self.profile;
        if profile.display_name.is_none() {
            profile.display_name = self.display_name;
        }
        profile
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub room_id: RoomId,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Events sent by the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedEvent),
    RoomCreated(RoomCreatedEvent),
    RoomJoined(RoomJoinedEvent),
    UserJoined(UserJoinedEvent),
    ReceiveMessage(ReceiveMessageEvent),
    UserTyping(UserTypingEvent),
    UserLeft(UserLeftEvent),
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Builds an `error` event with a user-visible message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorEvent {
            message: message.into(),
        })
    }

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::RoomCreated(_) => "room-created",
            Self::RoomJoined(_) => "room-joined",
            Self::UserJoined(_) => "user-joined",
            Self::ReceiveMessage(_) => "receive-message",
            Self::UserTyping(_) => "user-typing",
            Self::UserLeft(_) => "user-left",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedEvent {
    pub room_id: RoomId,
}

/// Admission confirmation. For a creator `profile` is its own profile, for a
/// joiner it is the creator's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedEvent {
    pub room_id: RoomId,
    pub profile: Profile,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedEvent {
    pub user_id: ConnectionId,
    pub profile: Profile,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessageEvent {
    pub room_id: RoomId,
    pub message: Value,
    pub sender_id: ConnectionId,
    pub profile: Profile,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingEvent {
    pub username: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftEvent {
    pub username: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_shape() {
        let event = ClientEvent::JoinRoom(JoinRoomRequest {
            room_id: RoomId::new("ab12cd"),
            profile: Profile::named("Calm-Yak"),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "join-room",
                "data": {"roomId": "ab12cd", "profile": {"displayName": "Calm-Yak"}}
            })
        );
    }

    #[test]
    fn test_create_room_without_profile() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "create-room", "data": {}})).unwrap();

        assert_eq!(event, ClientEvent::CreateRoom(CreateRoomRequest::default()));
    }

    #[test]
    fn test_create_room_without_data() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "create-room"})).unwrap();
        assert_eq!(event, ClientEvent::CreateRoom(CreateRoomRequest::default()));

        let event: ClientEvent =
            serde_json::from_value(json!({"event": "create-room", "data": null})).unwrap();
        assert_eq!(event, ClientEvent::CreateRoom(CreateRoomRequest::default()));
    }

    #[test]
    fn test_create_room_with_bare_display_name() {
        let event: ClientEvent = serde_json::from_value(
            json!({"event": "create-room", "data": {"displayName": "Alice"}}),
        )
        .unwrap();

        match event {
            ClientEvent::CreateRoom(req) => {
                assert_eq!(req.into_profile().display_name(), "Alice");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_profile_name_wins_over_display_name() {
        let req = CreateRoomRequest {
            profile: Profile::named("Quiet-Otter"),
            display_name: Some("Alice".to_string()),
        };
        assert_eq!(req.into_profile().display_name(), "Quiet-Otter");
    }

    #[test]
    fn test_unknown_and_incomplete_events_rejected() {
        let unknown = serde_json::from_value::<ClientEvent>(json!({"event": "dance", "data": {}}));
        assert!(unknown.is_err());

        let missing_room =
            serde_json::from_value::<ClientEvent>(json!({"event": "join-room", "data": {}}));
        assert!(missing_room.is_err());
    }

    #[test]
    fn test_client_events_survive_serialization() {
        let events = vec![
            ClientEvent::CreateRoom(CreateRoomRequest::new(Profile::named("Alice"))),
            ClientEvent::TypingEnd(TypingRequest {
                room_id: RoomId::new("ab12cd"),
                username: None,
            }),
            ClientEvent::LeaveRoom,
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(serde_json::from_str::<ClientEvent>(&json).unwrap(), event);
        }
    }

    #[test]
    fn test_leave_room_has_no_payload() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "leave-room"})).unwrap();
        assert_eq!(event, ClientEvent::LeaveRoom);
        assert_eq!(event.name(), "leave-room");
    }

    #[test]
    fn test_send_message_keeps_opaque_payload() {
        let raw = json!({
            "event": "send-message",
            "data": {
                "roomId": "ab12cd",
                "message": {"type": "public-key", "key": "AAAA"},
                "senderId": "abc"
            }
        });

        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        match event {
            ClientEvent::SendMessage(req) => {
                assert_eq!(req.message, json!({"type": "public-key", "key": "AAAA"}));
                assert_eq!(req.sender_id, Some(ConnectionId::new("abc")));
                assert!(req.profile.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_server_event_names() {
        let typing = ServerEvent::UserTyping(UserTypingEvent {
            username: "Anonymous".to_string(),
            is_typing: true,
        });
        let json = serde_json::to_value(&typing).unwrap();

        assert_eq!(json["event"], typing.name());
        assert_eq!(json["data"]["isTyping"], true);
        assert_eq!(ServerEvent::error("Room is full").name(), "error");
    }
}
