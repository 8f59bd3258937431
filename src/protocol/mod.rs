//! Wire-level types shared by the relay and its clients.
//!
//! - [`types`]: room and connection identifiers, roles, profiles
//! - [`events`]: client-to-relay and relay-to-client events
//! - [`envelope`]: key material vs. ciphertext inside a chat message

mod envelope;
mod events;
mod types;

pub use envelope::EnvelopePayload;
pub use events::{
    ClientEvent, ConnectedEvent, CreateRoomRequest, ErrorEvent, JoinRoomRequest,
    ReceiveMessageEvent, RoomCreatedEvent, RoomJoinedEvent, SendMessageRequest, ServerEvent,
    TypingRequest, UserJoinedEvent, UserLeftEvent, UserTypingEvent,
};
pub use types::{ConnectionId, Profile, Role, RoomId, ANONYMOUS, CONNECTION_ID_LEN};

use chrono::NaiveDateTime;

/// Formats a time the way the relay stamps events, e.g. `3:07 PM`.
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// The relay's current local time, formatted with [`format_timestamp`].
pub fn relay_timestamp() -> String {
    format_timestamp(&chrono::Local::now().naive_local())
}
