//! Identifiers and participant profiles.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Label used wherever a participant did not provide a display name.
pub const ANONYMOUS: &str = "Anonymous";

/// Length of a relay-assigned connection id.
pub const CONNECTION_ID_LEN: usize = 20;

/// Short random token naming a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque relay-assigned handle, unique per live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random alphanumeric id.
    pub fn random() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONNECTION_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A participant's role within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First entry of the room; reacts to `user-joined` by sending its key.
    Creator,
    /// Joined an existing room; sends its key as soon as it is admitted.
    Joiner,
}

/// Self-asserted display profile.
///
/// The relay stores and forwards it but never validates it; the avatar is an
/// opaque value produced and rendered by clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<serde_json::Value>,
}

const ADJECTIVES: &[&str] = &[
    "Amber", "Brave", "Calm", "Clever", "Dusty", "Eager", "Gentle", "Hidden", "Jolly", "Lucky",
    "Misty", "Nimble", "Quiet", "Rapid", "Silent", "Swift", "Tidy", "Velvet", "Witty", "Zesty",
];

const ANIMALS: &[&str] = &[
    "Badger", "Crane", "Dolphin", "Falcon", "Gecko", "Heron", "Ibis", "Jackal", "Koala", "Lemur",
    "Marten", "Newt", "Otter", "Panda", "Quail", "Raven", "Stoat", "Tapir", "Walrus", "Yak",
];

impl Profile {
    /// Creates a profile with the given display name and no avatar.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            avatar: None,
        }
    }

    /// Creates a profile with a random `Adjective-Animal` name.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Quiet");
        let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Otter");
        Self::named(format!("{adjective}-{animal}"))
    }

    /// The name to show for this participant, `"Anonymous"` when absent or blank.
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS)
    }
}
