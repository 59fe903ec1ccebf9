//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory log (lost on exit)
//! parley-server --bind 127.0.0.1:7878
//!
//! # Durable log in SQLite
//! parley-server --bind 0.0.0.0:7878 --database chat.db
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use parley_core::StorageConfig;
use parley_server::{GatewayConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Poll-based multi-user chat server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    bind: String,

    /// SQLite database file; omit for an in-memory log
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Poll interval advertised to clients, in milliseconds
    #[arg(long, default_value = "2000")]
    poll_interval_ms: u64,

    /// Longest accepted message body, in characters
    #[arg(long)]
    max_body_chars: Option<usize>,

    /// Minimum time between posts from one session, in milliseconds
    #[arg(long, default_value = "0")]
    post_cooldown_ms: u64,

    /// Maximum concurrent sessions
    #[arg(long, default_value = "10000")]
    max_sessions: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);

    let storage = match args.database {
        Some(path) => {
            tracing::info!("Using SQLite log at {}", path.display());
            StorageConfig::Sqlite { path }
        },
        None => {
            tracing::warn!("No database given - messages are kept in memory only");
            StorageConfig::Memory
        },
    };

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        storage,
        gateway: GatewayConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            max_body_chars: args.max_body_chars,
            post_cooldown: Duration::from_millis(args.post_cooldown_ms),
            max_sessions: args.max_sessions,
            ..Default::default()
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);
    tracing::info!("{} messages in log", server.gateway().store().count()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
