//! PolyChat terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Staging server
//! polychat --username alice
//!
//! # Another server, verbose logs
//! RUST_LOG=debug polychat --server ws://localhost:8080 --username alice
//! ```

use std::time::Duration;

use clap::Parser;
use polychat_cli::{CliError, runtime};
use polychat_client::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_RECONNECT_DELAY, DEFAULT_RETRY_DELAY, SessionEnd,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// PolyChat terminal client
#[derive(Parser, Debug)]
#[command(name = "polychat")]
#[command(about = "Line-oriented client for the PolyChat chat service")]
#[command(version)]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Identity to sign in as (3 to 15 characters)
    #[arg(short, long)]
    username: String,

    /// Delay before re-sending a frame that could not be written
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    retry_delay_ms: u64,

    /// Delay between consecutive reconnect attempts
    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY.as_millis() as u64)]
    reconnect_delay_ms: u64,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.server.clone(),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr; stdout is the chat surface.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let local = tokio::task::LocalSet::new();
    let end = local.run_until(runtime::run(args.config(), args.username.clone())).await?;

    match end {
        SessionEnd::SignedOut => tracing::info!("signed out"),
        SessionEnd::Quit => tracing::info!("bye"),
        SessionEnd::Terminated { code } => tracing::warn!(code, "server ended the session"),
    }
    Ok(())
}
