//! Handshake state for one client connection.
//!
//! `PeerSession` owns this connection's key pair and walks the handshake:
//!
//! ```text
//! Idle -> RoomPending -> RoomEstablished -> KeyExchanging -> SecureChannelReady
//! ```
//!
//! Both ends send their public key unprompted. A joiner sends it as soon as
//! it is admitted; a creator sends it when told someone joined. Whichever key
//! arrives first, a side that has not sent its own key yet answers with it, so
//! a lost trigger on one end still completes the exchange.

use std::fmt;
use std::time::{Duration, Instant};

use x25519_dalek::PublicKey;

use crate::chat::error::ChatError;
use crate::crypto::{decrypt, encrypt, import_public_key, KeyPair};
use crate::protocol::{EnvelopePayload, Role, RoomId};

/// Where a connection is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Not in a room.
    Idle,
    /// Create or join sent, no answer yet.
    RoomPending,
    /// In a room, no counterpart key exchange under way.
    RoomEstablished,
    /// Own key sent, waiting for the counterpart's.
    KeyExchanging,
    /// Counterpart key imported; messages may be sealed.
    SecureChannelReady,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RoomPending => "waiting for the relay",
            Self::RoomEstablished => "waiting for a counterpart",
            Self::KeyExchanging => "exchanging keys",
            Self::SecureChannelReady => "secure",
        };
        f.write_str(name)
    }
}

/// Key material and handshake progress of one connection.
pub struct PeerSession {
    keys: KeyPair,
    state: HandshakeState,
    role: Option<Role>,
    room_id: Option<RoomId>,
    peer_key: Option<PublicKey>,
    key_sent: bool,
    exchange_started: Option<Instant>,
}

impl PeerSession {
    /// Starts idle with a fresh key pair.
    pub fn new() -> Result<Self, ChatError> {
        Ok(Self {
            keys: KeyPair::generate()?,
            state: HandshakeState::Idle,
            role: None,
            room_id: None,
            peer_key: None,
            key_sent: false,
            exchange_started: None,
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::SecureChannelReady
    }

    /// This connection's exported public key.
    pub fn public_key(&self) -> String {
        self.keys.export_public()
    }

    /// A create or join request went out.
    pub fn request_room(&mut self) -> Result<(), ChatError> {
        if self.state != HandshakeState::Idle {
            return Err(self.invalid("request a room"));
        }
        self.state = HandshakeState::RoomPending;
        Ok(())
    }

    /// The relay refused the pending request.
    pub fn request_rejected(&mut self) {
        if self.state == HandshakeState::RoomPending {
            self.state = HandshakeState::Idle;
        }
    }

    /// The relay admitted this connection.
    ///
    /// A joiner returns its key envelope to send right away.
    pub fn room_established(
        &mut self,
        room_id: RoomId,
        role: Role,
    ) -> Result<Option<EnvelopePayload>, ChatError> {
        if self.state != HandshakeState::RoomPending {
            return Err(self.invalid("enter a room"));
        }
        self.room_id = Some(room_id);
        self.role = Some(role);
        self.state = HandshakeState::RoomEstablished;

        match role {
            Role::Joiner => Ok(Some(self.begin_exchange())),
            Role::Creator => Ok(None),
        }
    }

    /// A counterpart entered the room.
    ///
    /// Returns the key envelope to send, or `None` if the exchange is already
    /// past that point.
    pub fn counterpart_joined(&mut self) -> Option<EnvelopePayload> {
        if self.state == HandshakeState::RoomEstablished && !self.key_sent {
            Some(self.begin_exchange())
        } else {
            None
        }
    }

    /// Imports the counterpart's public key.
    ///
    /// Returns this side's key envelope if it has not been sent yet.
    pub fn accept_peer_key(&mut self, exported: &str) -> Result<Option<EnvelopePayload>, ChatError> {
        match self.state {
            HandshakeState::RoomEstablished
            | HandshakeState::KeyExchanging
            | HandshakeState::SecureChannelReady => {}
            _ => return Err(self.invalid("accept a key")),
        }

        let key = import_public_key(exported)?;
        self.peer_key = Some(key);

        let reply = if self.key_sent {
            None
        } else {
            Some(self.begin_exchange())
        };
        self.state = HandshakeState::SecureChannelReady;
        self.exchange_started = None;
        Ok(reply)
    }

    /// Encrypts text for the counterpart.
    pub fn seal(&self, text: &str) -> Result<EnvelopePayload, ChatError> {
        let peer_key = match (&self.peer_key, self.state) {
            (Some(key), HandshakeState::SecureChannelReady) => key,
            _ => return Err(ChatError::ChannelNotReady),
        };
        let sealed = encrypt(peer_key, text.as_bytes())?;
        Ok(EnvelopePayload::ciphertext(&sealed))
    }

    /// Decrypts a ciphertext envelope addressed to this connection.
    pub fn open(&self, payload: &EnvelopePayload) -> Result<String, ChatError> {
        let bytes = match payload.ciphertext_bytes() {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return Err(ChatError::MalformedEnvelope(e.to_string())),
            None => {
                return Err(ChatError::MalformedEnvelope(
                    "expected ciphertext, got key material".to_string(),
                ))
            }
        };
        let plaintext = decrypt(self.keys.secret_key(), &bytes)?;
        String::from_utf8(plaintext).map_err(|_| ChatError::InvalidPlaintext)
    }

    /// The counterpart left; wait for a new one as the room's creator.
    pub fn counterpart_left(&mut self) {
        if self.room_id.is_none() {
            return;
        }
        self.state = HandshakeState::RoomEstablished;
        self.role = Some(Role::Creator);
        self.peer_key = None;
        self.key_sent = false;
        self.exchange_started = None;
    }

    /// Leaves the room and starts over with a fresh key pair.
    pub fn reset(&mut self) -> Result<(), ChatError> {
        *self = Self::new()?;
        Ok(())
    }

    /// True once key exchange has been under way for at least `after`.
    pub fn handshake_stalled(&self, after: Duration) -> bool {
        self.state == HandshakeState::KeyExchanging
            && self
                .exchange_started
                .map(|started| started.elapsed() >= after)
                .unwrap_or(false)
    }

    fn begin_exchange(&mut self) -> EnvelopePayload {
        self.key_sent = true;
        self.state = HandshakeState::KeyExchanging;
        self.exchange_started = Some(Instant::now());
        EnvelopePayload::PublicKey {
            key: self.keys.export_public(),
        }
    }

    fn invalid(&self, action: &'static str) -> ChatError {
        ChatError::InvalidTransition {
            action,
            state: self.state.to_string(),
        }
    }
}
