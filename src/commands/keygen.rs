//! Key generation command.

use anyhow::{Context, Result};
use clap::Args;

use cipherroom::crypto::{KeyPair, MAX_PLAINTEXT_LEN};

use super::CommandExecutor;

/// Generate a throwaway key pair and print its exported public key.
///
/// Chat sessions generate their own keys; this only shows the format that
/// travels through the relay.
#[derive(Args, Debug)]
pub struct KeygenCommand {
    /// Print only the key, without explanation
    #[arg(short, long)]
    pub quiet: bool,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self) -> Result<()> {
        let keypair = KeyPair::generate().context("Failed to generate key pair")?;
        let exported = keypair.export_public();

        if self.quiet {
            println!("{}", exported);
            return Ok(());
        }

        println!("Public key (base64, X25519):");
        println!("  {}", exported);
        println!();
        println!("Messages sealed to this key may carry up to {} bytes.", MAX_PLAINTEXT_LEN);
        println!("The private half was never written anywhere.");
        Ok(())
    }
}
