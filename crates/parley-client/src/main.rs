//! Parley command-line client.
//!
//! Lines typed on stdin are posted; the transcript is refreshed on the
//! server's poll interval and new messages are written to stdout.
//!
//! # Usage
//!
//! ```bash
//! parley --server 127.0.0.1:7878 --name alice
//! ```
//!
//! Type `/quit` (or close stdin) to leave.

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use parley_client::{ClientError, Connection, Transcript, WireMessage};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::MissedTickBehavior,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Messages kept in memory for the session.
const MAX_RETAINED: usize = 10_000;

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Poll-based multi-user chat client")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// Poll interval in milliseconds; defaults to the server's advice
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of past messages to show on join
    #[arg(long, default_value = "50")]
    history: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn show(messages: &[WireMessage]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for message in messages {
        writeln!(
            out,
            "[{}] {}: {}",
            message.timestamp.format("%H:%M:%S"),
            message.username,
            message.body
        )?;
    }
    out.flush()
}

fn notice(text: &str) -> io::Result<()> {
    writeln!(io::stderr().lock(), "* {text}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let mut conn = Connection::connect(&args.server).await?;
    let welcome = conn.set_username(&args.name).await?;
    tracing::info!("Joined {} as {}", args.server, welcome.username);

    let period = args.interval_ms.map_or(welcome.poll_interval, Duration::from_millis);
    let mut transcript = Transcript::with_retention(MAX_RETAINED);
    let window = conn.poll_recent(args.history).await?;
    show(transcript.replace(window))?;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => show(&conn.catch_up(&mut transcript).await?)?,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if line == "/quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }

                match conn.post(line).await {
                    Ok(_) => show(&conn.catch_up(&mut transcript).await?)?,
                    Err(ClientError::Server { message, .. }) => notice(&message)?,
                    Err(e) => return Err(e.into()),
                }
            },
        }
    }

    conn.goodbye().await?;
    Ok(())
}
