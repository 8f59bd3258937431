//! CipherRoom - two-party encrypted chat over an untrusted relay
//!
//! Run a relay with `cipherroom serve`, then `cipherroom create` on one side
//! and `cipherroom join <room>` on the other.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{CommandExecutor, CreateCommand, JoinCommand, KeygenCommand, ServeCommand};

/// CipherRoom - two-party encrypted chat over an untrusted relay
///
/// The relay pairs two connections per room and forwards opaque payloads.
/// Keys are generated per connection and exchanged through the room; the
/// relay never sees plaintext.
#[derive(Parser)]
#[command(name = "cipherroom")]
#[command(version)]
#[command(about = "Two-party end-to-end encrypted chat over an untrusted relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve(ServeCommand),

    /// Create a room and wait for someone to join
    Create(CreateCommand),

    /// Join an existing room
    Join(JoinCommand),

    /// Print a freshly generated public key
    Keygen(KeygenCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(cmd) => cmd.execute(),
        Commands::Create(cmd) => cmd.execute(),
        Commands::Join(cmd) => cmd.execute(),
        Commands::Keygen(cmd) => cmd.execute(),
    }
}
