//! Shopkeep - terminal front end for the shop session.
//!
//! Drives the session lifecycle the way the app's screens do: restore the
//! persisted session on start, then sign up, log in, log out or watch the
//! session until it expires.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopkeep_core::{Config, SessionManager};

use commands::Command;

const USAGE: &str = "\
Usage: shopkeep <command>

Commands:
  signup [email]   Create an account and log in
  login [email]    Log in with an existing account
  logout           End the session and forget it
  status           Show the current session
  watch            Follow the session until it expires (Ctrl-C to stop)

Environment:
  SHOPKEEP_API_KEY        Identity API key (required for signup/login)
  SHOPKEEP_IDENTITY_URL   Identity endpoint override
  SHOPKEEP_STORAGE        file | keyring | memory
  RUST_LOG                Log filter (default: warn)";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    init_tracing();
    info!("Shopkeep starting");

    let mut config = Config::load()?;
    config.apply_env()?;

    let manager = SessionManager::new(config.identity_client()?, config.open_store()?);
    manager.restore_session();

    let result = commands::run(command, &manager, &mut config).await;

    info!("Shopkeep shutting down");
    result
}
