//! Console Bot
//!
//! Runs csbot with the terminal standing in for the IRC network: every line
//! typed on stdin arrives as a message, every outbound action is printed.
//!
//! ```text
//! > test foo "bar baz"            private message to the bot
//! > #cs-york !auth.check alan     message to #cs-york
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --config csbot.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use csbot_core::transport::is_channel;
use csbot_core::{EventPayload, MessageData, Transport, TransportResult};
use csbot_runtime::{BotRuntime, InboundSender, deliver, inbound_channel};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::WeakSender;
use tracing::debug;

// Keeps the plugin registrations linked into the binary.
use csbot_plugins as _;

#[derive(Parser, Debug)]
#[command(about = "Run csbot on the terminal")]
struct Args {
    /// Configuration file (defaults to searching for csbot.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Nick to send console lines as
    #[arg(short, long, default_value = "console")]
    user: String,
}

// ============================================================================
// Transport
// ============================================================================

/// Prints outbound actions and feeds the network's answers back in.
struct ConsoleTransport {
    inbound: WeakSender<EventPayload>,
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn msg(&self, target: &str, message: &str) -> TransportResult<()> {
        println!("[{target}] {message}");
        Ok(())
    }

    async fn join(&self, channel: &str) -> TransportResult<()> {
        println!("* joining {channel}");
        deliver(
            &self.inbound,
            EventPayload::Joined {
                channel: channel.to_string(),
            },
        )
    }

    async fn leave(&self, channel: &str) -> TransportResult<()> {
        println!("* leaving {channel}");
        deliver(
            &self.inbound,
            EventPayload::Left {
                channel: channel.to_string(),
            },
        )
    }

    /// Everyone on the console is identified to an account of their nick.
    async fn identify(&self, nick: &str) -> TransportResult<()> {
        deliver(
            &self.inbound,
            EventPayload::UserIdentified {
                user: nick.to_string(),
                account: Some(nick.to_string()),
            },
        )
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

async fn read_console(inbound: InboundSender, user: String, nickname: String) -> Result<()> {
    let user = format!("{user}!~{user}@console");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let (channel, message) = match line.split_once(' ') {
            Some((channel, rest)) if is_channel(channel) => (channel.to_string(), rest.to_string()),
            _ => (nickname.clone(), line),
        };
        debug!(channel = %channel, "Console line");
        inbound
            .send(EventPayload::Message(MessageData {
                user: user.clone(),
                channel,
                message,
            }))
            .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (tx, rx) = inbound_channel();

    let transport = Arc::new(ConsoleTransport {
        inbound: tx.downgrade(),
    });
    let mut builder = BotRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.start(transport).await?;

    tx.send(EventPayload::Connected).await?;
    tx.send(EventPayload::SignedOn).await?;

    // The inbound channel closes once stdin does, which stops the runtime.
    let nickname = runtime.bot().nickname().to_string();
    tokio::spawn(async move {
        if let Err(e) = read_console(tx, args.user, nickname).await {
            eprintln!("console input failed: {e}");
        }
    });

    runtime.run(rx).await?;
    Ok(())
}
