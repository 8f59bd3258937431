//! Client-side event handling.
//!
//! [`ChatClient`] sits between the relay connection and the user. Relay
//! events drive the handshake and come back as a [`Reaction`]: events to send
//! back to the relay, and notices to show. It does no I/O itself.

use tracing::{debug, warn};

use crate::chat::error::ChatError;
use crate::chat::session::{HandshakeState, PeerSession};
use crate::protocol::{
    ClientEvent, ConnectionId, CreateRoomRequest, EnvelopePayload, JoinRoomRequest, Profile,
    ReceiveMessageEvent, Role, RoomId, SendMessageRequest, ServerEvent, TypingRequest,
};

/// Something the user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The relay assigned this connection an id.
    Connected(ConnectionId),
    /// A new room was created; share this id with the counterpart.
    RoomCreated(RoomId),
    /// This connection is now in `room_id`.
    RoomJoined {
        room_id: RoomId,
        role: Role,
        /// Display name of the room's creator.
        host: String,
    },
    /// A counterpart entered the room.
    PeerJoined { name: String },
    /// Keys exchanged; messages are end-to-end encrypted from here on.
    SecureChannelReady,
    /// A decrypted message.
    Message {
        text: String,
        sender_id: ConnectionId,
        sender: String,
        timestamp: String,
    },
    PeerTyping { name: String, is_typing: bool },
    PeerLeft { name: String, timestamp: String },
    /// The relay refused a request.
    Rejected(String),
}

/// Outcome of handling one relay event.
#[derive(Debug, Default, PartialEq)]
pub struct Reaction {
    pub outgoing: Vec<ClientEvent>,
    pub notices: Vec<Notice>,
}

impl Reaction {
    fn notice(notice: Notice) -> Self {
        Self {
            outgoing: Vec::new(),
            notices: vec![notice],
        }
    }
}

/// One participant's view of a room.
pub struct ChatClient {
    session: PeerSession,
    profile: Profile,
    connection_id: Option<ConnectionId>,
}

impl ChatClient {
    pub fn new(profile: Profile) -> Result<Self, ChatError> {
        Ok(Self {
            session: PeerSession::new()?,
            profile,
            connection_id: None,
        })
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Request a new room.
    pub fn create_room(&mut self) -> Result<ClientEvent, ChatError> {
        self.session.request_room()?;
        Ok(ClientEvent::CreateRoom(CreateRoomRequest::new(self.profile.clone())))
    }

    /// Request to join an existing room.
    pub fn join_room(&mut self, room_id: RoomId) -> Result<ClientEvent, ChatError> {
        self.session.request_room()?;
        Ok(ClientEvent::JoinRoom(JoinRoomRequest {
            room_id,
            profile: self.profile.clone(),
        }))
    }

    /// Encrypts `text` for the counterpart.
    ///
    /// Fails with [`ChatError::ChannelNotReady`] until the key exchange is done.
    pub fn compose(&self, text: &str) -> Result<ClientEvent, ChatError> {
        let payload = self.session.seal(text)?;
        self.envelope(payload)
    }

    pub fn typing(&self, is_typing: bool) -> Result<ClientEvent, ChatError> {
        let request = TypingRequest {
            room_id: self.current_room()?.clone(),
            username: Some(self.profile.display_name().to_string()),
        };
        Ok(if is_typing {
            ClientEvent::TypingStart(request)
        } else {
            ClientEvent::TypingEnd(request)
        })
    }

    /// Leaves the current room and returns to idle with fresh keys.
    pub fn leave(&mut self) -> Result<ClientEvent, ChatError> {
        self.current_room()?;
        self.session.reset()?;
        Ok(ClientEvent::LeaveRoom)
    }

    /// Applies one relay event.
    ///
    /// Undecryptable or malformed messages are logged and dropped; they never
    /// fail the session.
    pub fn handle(&mut self, event: ServerEvent) -> Result<Reaction, ChatError> {
        match event {
            ServerEvent::Connected(connected) => {
                self.connection_id = Some(connected.connection_id.clone());
                Ok(Reaction::notice(Notice::Connected(connected.connection_id)))
            }
            ServerEvent::RoomCreated(created) => {
                Ok(Reaction::notice(Notice::RoomCreated(created.room_id)))
            }
            ServerEvent::RoomJoined(joined) => {
                let key = self
                    .session
                    .room_established(joined.room_id.clone(), joined.role)?;
                debug!(room = %joined.room_id, role = ?joined.role, "room established");

                let mut reaction = Reaction::notice(Notice::RoomJoined {
                    room_id: joined.room_id,
                    role: joined.role,
                    host: joined.profile.display_name().to_string(),
                });
                if let Some(key) = key {
                    reaction.outgoing.push(self.envelope(key)?);
                }
                Ok(reaction)
            }
            ServerEvent::UserJoined(joined) => {
                let mut reaction = Reaction::notice(Notice::PeerJoined {
                    name: joined.profile.display_name().to_string(),
                });
                if let Some(key) = self.session.counterpart_joined() {
                    reaction.outgoing.push(self.envelope(key)?);
                }
                Ok(reaction)
            }
            ServerEvent::ReceiveMessage(received) => self.receive(received),
            ServerEvent::UserTyping(typing) => Ok(Reaction::notice(Notice::PeerTyping {
                name: typing.username,
                is_typing: typing.is_typing,
            })),
            ServerEvent::UserLeft(left) => {
                self.session.counterpart_left();
                Ok(Reaction::notice(Notice::PeerLeft {
                    name: left.username,
                    timestamp: left.timestamp,
                }))
            }
            ServerEvent::Error(error) => {
                self.session.request_rejected();
                Ok(Reaction::notice(Notice::Rejected(error.message)))
            }
        }
    }

    fn receive(&mut self, received: ReceiveMessageEvent) -> Result<Reaction, ChatError> {
        let payload = match EnvelopePayload::from_value(&received.message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(sender = %received.sender_id, error = %e, "dropping malformed envelope");
                return Ok(Reaction::default());
            }
        };

        match payload {
            EnvelopePayload::PublicKey { key } => {
                let was_ready = self.session.is_ready();
                let reply = match self.session.accept_peer_key(&key) {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(sender = %received.sender_id, error = %e, "ignoring counterpart key");
                        return Ok(Reaction::default());
                    }
                };

                let mut reaction = Reaction::default();
                if let Some(reply) = reply {
                    reaction.outgoing.push(self.envelope(reply)?);
                }
                if !was_ready {
                    reaction.notices.push(Notice::SecureChannelReady);
                }
                Ok(reaction)
            }
            ciphertext @ EnvelopePayload::Ciphertext { .. } => {
                match self.session.open(&ciphertext) {
                    Ok(text) => Ok(Reaction::notice(Notice::Message {
                        text,
                        sender: received.profile.display_name().to_string(),
                        sender_id: received.sender_id,
                        timestamp: received.timestamp,
                    })),
                    Err(e) => {
                        warn!(sender = %received.sender_id, error = %e, "dropping undecryptable message");
                        Ok(Reaction::default())
                    }
                }
            }
        }
    }

    fn current_room(&self) -> Result<&RoomId, ChatError> {
        match (self.session.state(), self.session.room_id()) {
            (HandshakeState::Idle | HandshakeState::RoomPending, _) | (_, None) => {
                Err(ChatError::NotInRoom)
            }
            (_, Some(room_id)) => Ok(room_id),
        }
    }

    fn envelope(&self, payload: EnvelopePayload) -> Result<ClientEvent, ChatError> {
        Ok(ClientEvent::SendMessage(SendMessageRequest {
            room_id: self.current_room()?.clone(),
            message: payload
                .to_value()
                .map_err(|e| ChatError::MalformedEnvelope(e.to_string()))?,
            sender_id: self.connection_id.clone(),
            profile: Some(self.profile.clone()),
            timestamp: None,
        }))
    }
}
