//! pomo - line client for the pomo daemon
//!
//! Connects to the daemon as one chat, forwards each line typed on stdin as
//! a command and prints everything the daemon sends back.
//!
//! # Usage
//!
//! ```text
//! pomo --chat 42                 # talk to the daemon as chat 42
//! pomo --chat 42 --socket /run/pomo.sock
//! echo /start | pomo --chat 42   # one-shot command
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pomo_core::ChatId;
use pomo_protocol::{ClientMessage, DaemonMessage};
use pomod::config::{DEFAULT_SOCKET_PATH, SOCKET_ENV};

/// pomo - talk to the pomo daemon from a terminal
#[derive(Parser, Debug)]
#[command(name = "pomo", version, about)]
struct Args {
    /// Chat to act as
    #[arg(long)]
    chat: ChatId,

    /// Daemon socket
    #[arg(long, env = SOCKET_ENV, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("pomo=warn".parse()?))
        .init();

    let stream = UnixStream::connect(&args.socket)
        .await
        .with_context(|| format!("Failed to connect to {}", args.socket.display()))?;
    let (reader, mut writer) = stream.into_split();
    let mut daemon_lines = BufReader::new(reader).lines();

    send(&mut writer, &ClientMessage::connect(args.chat)).await?;
    match read_reply(&mut daemon_lines).await? {
        Some(DaemonMessage::Connected { chat_id, .. }) => debug!(chat_id = %chat_id, "Connected"),
        Some(DaemonMessage::Rejected { reason, .. }) => bail!("Daemon rejected connection: {reason}"),
        Some(other) => bail!("Unexpected handshake reply: {other:?}"),
        None => bail!("Daemon closed the connection during handshake"),
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = input.next_line(), if input_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => send(&mut writer, &ClientMessage::command(line.trim())).await?,
                    None => {
                        // Keep printing replies until the daemon goes quiet
                        input_open = false;
                        send(&mut writer, &ClientMessage::disconnect()).await?;
                    }
                }
            }

            reply = read_reply(&mut daemon_lines) => {
                match reply? {
                    Some(msg) => print_message(&msg),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn send(writer: &mut tokio::net::unix::OwnedWriteHalf, msg: &ClientMessage) -> Result<()> {
    let json = serde_json::to_string(msg).context("Failed to serialize message")?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn read_reply(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
) -> Result<Option<DaemonMessage>> {
    match lines.next_line().await.context("Failed to read from daemon")? {
        Some(line) => Ok(Some(
            serde_json::from_str(&line).context("Daemon sent an invalid message")?,
        )),
        None => Ok(None),
    }
}

fn print_message(msg: &DaemonMessage) {
    match msg {
        DaemonMessage::Message {
            message_id,
            text,
            keyboard,
        } => {
            println!("[{message_id}] {text}");
            if let Some(keyboard) = keyboard {
                for row in &keyboard.rows {
                    println!("    {}", row.join("  "));
                }
            }
        }
        DaemonMessage::MessageEdited { message_id, text } => println!("[{message_id}] {text}"),
        DaemonMessage::Error { message, .. } => eprintln!("error: {message}"),
        DaemonMessage::Pong { .. }
        | DaemonMessage::Connected { .. }
        | DaemonMessage::Rejected { .. } => debug!(?msg, "Ignoring control message"),
    }
}
