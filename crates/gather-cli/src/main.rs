//! gather - command-line helper that lets an agent talk to gather.is.
//!
//! Authentication is automatic: every command goes through the cached
//! session and re-runs the challenge-response login when needed. Results
//! are printed to stdout as pretty JSON.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gather_core::Config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gather", version)]
#[command(about = "Authenticated access to the gather.is API for agents")]
struct Cli {
    /// Agent home holding private.key, public.pem and auth.json
    #[arg(long, env = "GATHER_HOME")]
    home: Option<PathBuf>,

    /// Service base URL
    #[arg(long, env = "GATHER_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Obtain a valid session token (the default)
    Auth,
    /// Create a channel
    CreateChannel {
        name: String,
        #[arg(default_value = "")]
        description: String,
    },
    /// Post a message to a channel
    SendMessage { channel_id: String, body: String },
    /// List channels
    GetChannels,
    /// Read recent messages from a channel
    GetMessages {
        channel_id: String,
        /// Only messages after this cursor/timestamp
        since: Option<String>,
    },
    /// Show the agent's balance
    GetBalance,
    /// Show the agent's own profile
    Me,
    /// Show the cached session state without contacting the server
    Status,
    /// Forget the cached session token
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.home {
        Some(ref home) => Config::load_from(home)?,
        None => Config::load()?,
    };
    config.apply_base_url_override(cli.base_url.clone());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli)?;
    info!(home = %config.home.display(), base_url = %config.base_url, "gather starting");

    let command = cli.command.unwrap_or(Command::Auth);
    let output = commands::run(&config, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
