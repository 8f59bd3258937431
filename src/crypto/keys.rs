//! Key generation and public-key export for chat participants.
//!
//! Each connection owns exactly one X25519 key pair for its lifetime. Only the
//! exported public half ever leaves the process; it travels through the relay
//! as a base64 string.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Length in bytes of an X25519 key.
pub const KEY_LEN: usize = 32;

/// Errors that can occur during key operations.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

/// A participant's key pair.
///
/// The secret half is never serialized; `Debug` output redacts it.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &export_public_key(&self.public))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generates a new random key pair from the operating system RNG.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| KeyError::GenerationFailed(e.to_string()))?;

        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the secret key.
    pub fn secret_key(&self) -> &StaticSecret {
        &self.secret
    }

    /// Returns the transport-safe form of the public key.
    pub fn export_public(&self) -> String {
        export_public_key(&self.public)
    }
}

/// Serializes a public key for relay transit.
pub fn export_public_key(key: &PublicKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Parses a public key previously produced by [`export_public_key`].
pub fn import_public_key(exported: &str) -> Result<PublicKey, KeyError> {
    let bytes = BASE64.decode(exported.trim())?;
    let array: [u8; KEY_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::InvalidKeyLength {
            expected: KEY_LEN,
            got: bytes.len(),
        })?;
    Ok(PublicKey::from(array))
}
