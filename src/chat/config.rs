//! Chat client configuration.
//!
//! Values come from defaults, then an optional TOML file, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ChatError;
use crate::protocol::Profile;
use crate::transport::DEFAULT_MAX_FRAME_BYTES;

/// Default relay address.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:3000";

/// Default seconds in key exchange before the user is warned.
pub const DEFAULT_HANDSHAKE_WARN_SECS: u64 = 30;

/// File name looked up in the user's config directory.
pub const CLIENT_CONFIG_FILE_NAME: &str = "client.toml";

/// Configuration for a chat client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay to connect to.
    pub relay_addr: String,

    /// Name shown to the counterpart. A random one is generated if unset.
    pub display_name: Option<String>,

    /// Warn after this many seconds stuck in key exchange.
    pub handshake_warn_secs: u64,

    /// Largest accepted frame in bytes.
    pub max_frame_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_addr: DEFAULT_RELAY_ADDR.to_string(),
            display_name: None,
            handshake_warn_secs: DEFAULT_HANDSHAKE_WARN_SECS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ChatError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/cipherroom/client.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cipherroom").join(CLIENT_CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.relay_addr.trim().is_empty() {
            return Err(ChatError::Config("relay_addr must not be empty".to_string()));
        }
        if self.max_frame_bytes < 1024 || self.max_frame_bytes > u32::MAX as usize {
            return Err(ChatError::Config(format!(
                "max_frame_bytes must be between 1024 and {}, got {}",
                u32::MAX,
                self.max_frame_bytes
            )));
        }
        Ok(())
    }

    pub fn handshake_warn_after(&self) -> Duration {
        Duration::from_secs(self.handshake_warn_secs)
    }

    /// The profile announced to the relay.
    pub fn profile(&self) -> Profile {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => Profile::named(name.trim()),
            _ => Profile::generate(),
        }
    }
}
