//! Cryptographic primitives for the chat client.
//!
//! This module provides:
//! - Per-connection key pair generation (X25519)
//! - Public key export/import for relay transit (base64)
//! - Sealed-box encryption of short messages (X25519 + HKDF + ChaCha20Poly1305)
//!
//! The relay never calls into this module.

pub mod asymmetric;
pub mod keys;

pub use asymmetric::{decrypt, encrypt, AsymmetricError, MAX_PLAINTEXT_LEN};
pub use keys::{export_public_key, import_public_key, KeyError, KeyPair};
