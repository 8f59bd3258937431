//! The relay server.
//!
//! The relay pairs exactly two connections per room and forwards opaque
//! payloads between them. It holds no keys and never inspects chat content.
//!
//! - [`registry`]: rooms and memberships behind a single lock
//! - [`router`]: maps one inbound event to ordered deliveries
//! - [`server`]: TCP accept loop and per-connection tasks

mod config;
mod error;
pub mod registry;
pub mod router;
mod server;

pub use config::{RelayConfig, CONFIG_FILE_NAME, DEFAULT_BIND_ADDR, DEFAULT_ROOM_ID_LEN};
pub use error::{RelayError, RelayResult};
pub use registry::{
    JoinResult, LeaveOutcome, Membership, Participant, RandomRoomIds, Room, RoomIdSource,
    RoomRegistry, ROOM_CAPACITY,
};
pub use router::{Delivery, EventRouter, Inbound};
pub use server::{ConnectionHub, RelayServer};
