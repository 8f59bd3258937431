//! # Chat Client
//!
//! End-to-end encrypted two-party chat through an untrusted relay.
//!
//! Each connection generates its own key pair and hands the public half to
//! the counterpart through the relay. Once both keys are imported every
//! message is sealed to the recipient's key; the relay only ever sees
//! ciphertext and routing metadata.
//!
//! ## Security Model
//!
//! - **Per-connection keys**, regenerated on leave, never persisted
//! - **No plaintext fallback**: composing before the exchange completes fails locally
//! - **Undecryptable messages are dropped**, never fatal to the session
//! - **No authentication** of the exchanged keys; a malicious relay can substitute them

mod client;
mod config;
mod error;
mod session;

pub use client::{ChatClient, Notice, Reaction};
pub use config::{ClientConfig, CLIENT_CONFIG_FILE_NAME, DEFAULT_HANDSHAKE_WARN_SECS, DEFAULT_RELAY_ADDR};
pub use error::ChatError;
pub use session::{HandshakeState, PeerSession};
