//! Tether terminal chat.
//!
//! # Usage
//!
//! ```bash
//! # Wait for a partner
//! tether --name alice --listen 0.0.0.0:7878
//!
//! # Call a partner directly
//! tether --name bob --listen 0.0.0.0:7879 --connect 192.168.1.20:7878
//! ```
//!
//! Type text to chat. Commands: `/connect <address> [name]`, `/accept`,
//! `/reject`, `/withdraw`, `/disconnect`, `/file <path>`, `/cancel`,
//! `/seen <id>`, `/status`, `/quit`.

mod command;
mod console;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use command::Command;
use tether_session::{Connector, LocalProfile, Peer, SessionConfig, TcpTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tether peer chat
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Peer-to-peer chat with file transfer")]
#[command(version)]
struct Args {
    /// Name shown to the partner
    #[arg(short, long, default_value = "tether")]
    name: String,

    /// Avatar color as RRGGBB hex
    #[arg(long, default_value = "007FFF", value_parser = parse_color)]
    color: u32,

    /// Address to accept connections on
    #[arg(short, long, default_value = "0.0.0.0:7878")]
    listen: String,

    /// Partner address to call on startup
    #[arg(short, long)]
    connect: Option<String>,

    /// Directory for received files
    #[arg(long, default_value = "downloads")]
    download_dir: PathBuf,

    /// File bytes per chunk
    #[arg(long, default_value = "16384")]
    chunk_size: usize,

    /// Seconds to wait for the connection to the partner to open
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Seconds a pending request may wait for an answer before it is dropped
    #[arg(long, default_value = "30")]
    handshake_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            profile: LocalProfile::new(self.name.clone(), self.color),
            listen_address: self.listen.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            handshake_timeout: Duration::from_secs(self.handshake_timeout),
            chunk_size: self.chunk_size,
            download_dir: self.download_dir.clone(),
            ..SessionConfig::default()
        }
    }
}

fn parse_color(value: &str) -> Result<u32, String> {
    let hex = value.trim_start_matches('#').trim_start_matches("0x");
    let color = u32::from_str_radix(hex, 16).map_err(|e| format!("invalid color '{value}': {e}"))?;
    if color > 0x00FF_FFFF {
        return Err(format!("color '{value}' has more than six hex digits"));
    }
    Ok(color)
}

/// Run one command. Returns false when the user wants to quit.
async fn run(connector: &Connector<TcpTransport>, command: Command) -> bool {
    let result = match command {
        Command::Say(text) => connector.send_message(&text),
        Command::Connect { address, name } => {
            let name = name.unwrap_or_else(|| address.clone());
            connector.connect(Peer::new(address, name, 0)).await
        },
        Command::Accept => connector.accept_connection(),
        Command::Reject => connector.reject_connection(),
        Command::Withdraw => connector.withdraw_connection(),
        Command::Disconnect => connector.disconnect(),
        Command::SendFile(path) => connector.send_file(path).await,
        Command::Cancel => connector.cancel_file_transfer(),
        Command::Seen(id) => connector.mark_seen(&id),
        Command::Status => {
            let partner = connector.current_conversation().map_or_else(String::new, |c| {
                format!(" with {} ({})", c.display_name, c.address)
            });
            let address = connector.local_address().unwrap_or_else(|| "-".to_string());
            console::notice(&format!("{:?}{partner}, listening on {address}", connector.state()));
            Ok(())
        },
        Command::Quit => return false,
    };

    if let Err(e) = result {
        console::notice(&e.to_string());
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the chat; logs go to stderr
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    tracing::info!("Tether starting as {}", args.name);

    let connector = Connector::new(TcpTransport, args.session_config());
    console::attach(&connector);
    connector.prepare().await?;

    if let Some(address) = connector.local_address() {
        tracing::info!("Listening on {address}");
    }

    if let Some(address) = args.connect.clone() {
        run(&connector, Command::Connect { address, name: None }).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Ok(command) => {
                if !run(&connector, command).await {
                    break;
                }
            },
            Err(command::ParseError::Empty) => {},
            Err(e) => console::notice(&e.to_string()),
        }
    }

    connector.stop();
    connector.release();
    tracing::info!("Tether stopped");
    Ok(())
}
