//! Interactive chat commands.
//!
//! - `create` - open a new room and wait for someone to join
//! - `join <room>` - join an existing room
//!
//! Lines typed on stdin are sent as encrypted messages. Lines starting with
//! `/` are commands: `/create`, `/join <room>`, `/leave`, `/quit`, `/help`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use cipherroom::chat::{ChatClient, ChatError, ClientConfig, HandshakeState, Notice};
use cipherroom::protocol::{ClientEvent, RoomId, ServerEvent};
use cipherroom::transport::{self, FrameSink, FrameSource, TcpFrameWriter, TransportError};

use super::{runtime, CommandExecutor};

/// Options shared by `create` and `join`.
///
/// Settings come from `--config`, else `<config_dir>/cipherroom/client.toml`
/// if present, else defaults. Flags override the file.
#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Path to a client.toml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Relay address (default 127.0.0.1:3000)
    #[arg(short, long)]
    pub relay: Option<String>,

    /// Display name shown to the other participant (random if omitted)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Warn if key exchange takes longer than this many seconds (default 30)
    #[arg(long)]
    pub handshake_warn_secs: Option<u64>,
}

impl ClientArgs {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load_or_default(self.config.as_deref())
            .context("Failed to load client config")?;

        if let Some(relay) = &self.relay {
            config.relay_addr = relay.clone();
        }
        if let Some(name) = &self.name {
            config.display_name = Some(name.clone());
        }
        if let Some(secs) = self.handshake_warn_secs {
            config.handshake_warn_secs = secs;
        }
        config.validate().context("Invalid client config")?;
        Ok(config)
    }
}

/// Create a new room and chat in it.
#[derive(Args, Debug)]
pub struct CreateCommand {
    #[command(flatten)]
    pub client: ClientArgs,
}

impl CommandExecutor for CreateCommand {
    fn execute(&self) -> Result<()> {
        let config = self.client.config()?;
        runtime()?.block_on(run_chat(config, None))
    }
}

/// Join an existing room and chat in it.
#[derive(Args, Debug)]
pub struct JoinCommand {
    /// Room id shared by the room's creator
    pub room_id: String,

    #[command(flatten)]
    pub client: ClientArgs,
}

impl CommandExecutor for JoinCommand {
    fn execute(&self) -> Result<()> {
        let room_id = RoomId::new(self.room_id.trim());
        let config = self.client.config()?;
        runtime()?.block_on(run_chat(config, Some(room_id)))
    }
}

/// A parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Message(String),
    Create,
    Join(RoomId),
    Leave,
    Quit,
    Help,
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("create"), None) => Input::Create,
        (Some("join"), Some(room)) => Input::Join(RoomId::new(room)),
        (Some("leave"), None) => Input::Leave,
        (Some("quit" | "exit"), None) => Input::Quit,
        (Some("help"), None) => Input::Help,
        _ => Input::Unknown(line.to_string()),
    }
}

fn print_help() {
    println!("  /create       create a new room");
    println!("  /join <room>  join an existing room");
    println!("  /leave        leave the current room");
    println!("  /quit         disconnect and exit");
    println!("  anything else is sent as an encrypted message");
}

fn render(notice: &Notice) {
    match notice {
        Notice::Connected(id) => debug!(conn = %id, "connected to relay"),
        Notice::RoomCreated(room_id) => {
            println!("* Room created: {}", room_id);
            println!("* Share this id with the person you want to talk to.");
        }
        Notice::RoomJoined { room_id, host, .. } => {
            println!("* In room {} (created by {})", room_id, host);
        }
        Notice::PeerJoined { name } => println!("* {} joined, exchanging keys...", name),
        Notice::SecureChannelReady => println!("* Secure channel ready. Messages are end-to-end encrypted."),
        Notice::Message {
            text,
            sender,
            timestamp,
            ..
        } => println!("[{}] {}: {}", timestamp, sender, text),
        Notice::PeerTyping { name, is_typing } => {
            if *is_typing {
                println!("* {} is typing...", name);
            }
        }
        Notice::PeerLeft { name, timestamp } => {
            println!("[{}] * {} left. Waiting for someone new.", timestamp, name)
        }
        Notice::Rejected(message) => eprintln!("! Relay: {}", message),
    }
}

async fn send(writer: &mut TcpFrameWriter, event: &ClientEvent) -> Result<()> {
    debug!(event = event.name(), "sending");
    writer
        .send(event)
        .await
        .with_context(|| format!("Failed to send {}", event.name()))
}

/// Connects, enters a room and runs until the user quits or the relay hangs up.
async fn run_chat(config: ClientConfig, join: Option<RoomId>) -> Result<()> {
    let (mut reader, mut writer) = transport::connect(config.relay_addr.as_str(), config.max_frame_bytes)
        .await
        .with_context(|| format!("Failed to connect to relay at {}", config.relay_addr))?;

    let mut client = ChatClient::new(config.profile()).context("Failed to start session")?;
    println!("* Connected to {} as {}", config.relay_addr, client.profile().display_name());

    let first = match join {
        Some(room_id) => client.join_room(room_id)?,
        None => client.create_room()?,
    };
    send(&mut writer, &first).await?;

    // Frame reads are not cancellation safe, so they get their own task.
    let (event_tx, mut events) = mpsc::unbounded_channel::<Result<ServerEvent, TransportError>>();
    let reader_task = tokio::spawn(async move {
        loop {
            let next: Result<Option<ServerEvent>, TransportError> = reader.receive().await;
            let event = match next {
                Ok(Some(event)) => Ok(event),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = event.is_err();
            if event_tx.send(event).is_err() || failed {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stall_check = tokio::time::interval(Duration::from_secs(1));
    let warn_after = config.handshake_warn_after();
    let mut stall_warned = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Some(event) => event.context("Relay connection failed")?,
                    None => {
                        println!("* Relay closed the connection.");
                        break;
                    }
                };
                let reaction = client.handle(event)?;
                for outgoing in &reaction.outgoing {
                    send(&mut writer, outgoing).await?;
                }
                reaction.notices.iter().for_each(render);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Message(text) => match client.compose(&text) {
                        Ok(event) => send(&mut writer, &event).await?,
                        Err(ChatError::ChannelNotReady) => {
                            eprintln!("! Not sent: no one to talk to yet ({}).", client.session().state());
                        }
                        Err(e) => eprintln!("! Not sent: {}", e),
                    },
                    Input::Create => match client.create_room() {
                        Ok(event) => send(&mut writer, &event).await?,
                        Err(e) => eprintln!("! {}", e),
                    },
                    Input::Join(room_id) => match client.join_room(room_id) {
                        Ok(event) => send(&mut writer, &event).await?,
                        Err(e) => eprintln!("! {}", e),
                    },
                    Input::Leave => match client.leave() {
                        Ok(event) => {
                            send(&mut writer, &event).await?;
                            println!("* Left the room. /create or /join to start again.");
                        }
                        Err(e) => eprintln!("! {}", e),
                    },
                    Input::Quit => break,
                    Input::Help => print_help(),
                    Input::Unknown(line) => eprintln!("! Unknown command: {} (try /help)", line),
                }
            }
            _ = stall_check.tick() => {
                if client.session().state() != HandshakeState::KeyExchanging {
                    stall_warned = false;
                } else if !stall_warned && client.session().handshake_stalled(warn_after) {
                    stall_warned = true;
                    eprintln!(
                        "! Still waiting for the other side's key after {}s. They may have lost connection.",
                        warn_after.as_secs()
                    );
                }
            }
        }
    }

    // Best effort; the relay treats a closed connection as a leave.
    let _ = FrameSink::<ClientEvent>::close(&mut writer).await;
    reader_task.abort();
    Ok(())
}
