//! Relay error types.

use thiserror::Error;

use crate::protocol::RoomId;
use crate::transport::TransportError;

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised by the relay.
///
/// The `Display` text of the admission errors is exactly what the requesting
/// client sees in its `error` event.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Join target does not exist.
    #[error("Room doesn't exist")]
    RoomNotFound {
        /// The requested room.
        room_id: RoomId,
    },

    /// Join target already holds two participants.
    #[error("Room is full")]
    RoomFull {
        /// The requested room.
        room_id: RoomId,
    },

    /// The connection already occupies a room.
    #[error("Already in a room")]
    AlreadyInRoom {
        /// The room currently occupied.
        room_id: RoomId,
    },

    /// The connection is not a member of the room it addressed.
    #[error("Not in a room")]
    NotInRoom,

    /// No unused room id could be generated.
    #[error("Could not allocate a unique room id after {attempts} attempts")]
    RoomIdsExhausted {
        /// Number of ids tried.
        attempts: usize,
    },

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether the error is reported back to the requesting client.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            Self::RoomNotFound { .. }
                | Self::RoomFull { .. }
                | Self::AlreadyInRoom { .. }
                | Self::NotInRoom
                | Self::RoomIdsExhausted { .. }
        )
    }
}
