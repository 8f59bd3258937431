//! Relay server command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use cipherroom::relay::{RelayConfig, RelayServer};

use super::{runtime, CommandExecutor};

/// Run the relay server.
///
/// Settings come from `--config`, else `<config_dir>/cipherroom/relay.toml`
/// if present, else defaults. Flags override the file.
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Path to a relay.toml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:3000)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Length of generated room ids
    #[arg(long)]
    pub room_id_len: Option<usize>,
}

impl ServeCommand {
    fn load_config(&self) -> Result<RelayConfig> {
        let mut config = RelayConfig::load_or_default(self.config.as_deref())
            .context("Failed to load relay config")?;

        if let Some(bind) = &self.bind {
            config.bind_addr = bind.clone();
        }
        if let Some(len) = self.room_id_len {
            config.room_id_len = len;
        }
        config.validate().context("Invalid relay config")?;
        Ok(config)
    }
}

impl CommandExecutor for ServeCommand {
    fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        let rt = runtime()?;

        rt.block_on(async {
            let server = Arc::new(RelayServer::new(config));
            let listener = server.bind().await.context("Failed to bind relay")?;

            tokio::select! {
                result = Arc::clone(&server).run(listener) => {
                    result.context("Relay stopped")?;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for ctrl-c")?;
                    info!(
                        rooms = server.registry().room_count().await,
                        connections = server.hub().connection_count().await,
                        "shutting down"
                    );
                }
            }
            Ok(())
        })
    }
}
