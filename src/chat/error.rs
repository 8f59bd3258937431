//! Chat error types.

use thiserror::Error;

use crate::crypto::{AsymmetricError, KeyError};

/// Errors that can occur during chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A message was composed before the counterpart's key arrived.
    #[error("Secure channel not ready")]
    ChannelNotReady,

    /// The action needs room membership.
    #[error("Not in a room")]
    NotInRoom,

    /// The handshake cannot take this step from its current state.
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        /// What was attempted.
        action: &'static str,
        /// State at the time.
        state: String,
    },

    /// The counterpart sent a key that does not import.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(#[from] KeyError),

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] AsymmetricError),

    /// The `message` payload is neither key material nor ciphertext.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Decrypted bytes are not UTF-8 text.
    #[error("Decrypted message is not valid text")]
    InvalidPlaintext,

    /// IO error while reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid client configuration.
    #[error("Config error: {0}")]
    Config(String),
}
