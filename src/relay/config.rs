//! Relay configuration.
//!
//! Values come from defaults, then an optional TOML file, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{RelayError, RelayResult};
use crate::transport::DEFAULT_MAX_FRAME_BYTES;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default room id length (base-36 characters).
pub const DEFAULT_ROOM_ID_LEN: usize = 6;

/// Longest room id the relay will generate.
pub const MAX_ROOM_ID_LEN: usize = 16;

/// File name looked up in the user's config directory.
pub const CONFIG_FILE_NAME: &str = "relay.toml";

/// Configuration for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Length of generated room ids.
    pub room_id_len: usize,

    /// Largest accepted frame in bytes.
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            room_id_len: DEFAULT_ROOM_ID_LEN,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> RelayResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> RelayResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/cipherroom/relay.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cipherroom").join(CONFIG_FILE_NAME))
    }

    /// Check value ranges.
    pub fn validate(&self) -> RelayResult<()> {
        if self.room_id_len == 0 || self.room_id_len > MAX_ROOM_ID_LEN {
            return Err(RelayError::Config(format!(
                "room_id_len must be between 1 and {}, got {}",
                MAX_ROOM_ID_LEN, self.room_id_len
            )));
        }
        // Frame lengths travel as a u32 prefix.
        if self.max_frame_bytes < 1024 || self.max_frame_bytes > u32::MAX as usize {
            return Err(RelayError::Config(format!(
                "max_frame_bytes must be between 1024 and {}, got {}",
                u32::MAX,
                self.max_frame_bytes
            )));
        }
        Ok(())
    }
}
