//! # CipherRoom - two-party encrypted chat over an untrusted relay
//!
//! A relay server pairs exactly two connections per room and forwards their
//! payloads. Clients generate a key pair per connection, swap public keys
//! through the room, and from then on send only sealed messages. The relay
//! stores room membership and display profiles, nothing else.
//!
//! ## Security Model
//!
//! - **Relay sees routing metadata only**: room id, sender id, profile, time
//! - **Per-connection keys**: never persisted, regenerated on leave
//! - **Short messages**: each message is sealed on its own, up to
//!   [`crypto::MAX_PLAINTEXT_LEN`] bytes
//! - **Unauthenticated key exchange**: a malicious relay could substitute keys
//!
//! ## Example Usage
//!
//! ```rust
//! use cipherroom::crypto::{decrypt, encrypt, import_public_key, KeyPair};
//!
//! let bob = KeyPair::generate().unwrap();
//!
//! // Alice only ever sees Bob's exported key.
//! let bob_public = import_public_key(&bob.export_public()).unwrap();
//! let sealed = encrypt(&bob_public, b"hello").unwrap();
//!
//! assert_eq!(decrypt(bob.secret_key(), &sealed).unwrap(), b"hello");
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: key pairs and sealed-box encryption
//! - [`protocol`]: events and identifiers shared by relay and clients
//! - [`transport`]: length-prefixed JSON frames over TCP
//! - [`relay`]: room registry, event router and server
//! - [`chat`]: client handshake and message handling

pub mod chat;
pub mod crypto;
pub mod protocol;
pub mod relay;
pub mod transport;

// Re-export commonly used types at the crate root
pub use chat::{ChatClient, ChatError, ClientConfig, Notice};
pub use crypto::KeyPair;
pub use relay::{RelayConfig, RelayError, RelayServer, RoomRegistry};
