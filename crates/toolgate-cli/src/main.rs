//! toolgate - access control and billing kiosk for shared equipment.
//!
//! `toolgate run` keeps the whole cycle in one process. The stage commands
//! (`login`, `timer`, `usage`, `settle`) each run one stage, pass the session
//! on through the handoff file, and replace themselves with the next stage.

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use toolgate_core::StationConfig;
use toolgate_core::constants::DEFAULT_CONFIG_FILE_NAME;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(about = "Access control and billing kiosk for shared equipment")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Station configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Log filter, e.g. "info" or "toolgate_kiosk=debug". Overrides RUST_LOG.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Run a single stage without starting the next one
    #[arg(long, global = true)]
    no_chain: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the whole session cycle in one process (default)
    Run,
    /// Wait for a credential and start a session
    Login,
    /// Run the session timer
    Timer,
    /// Ask for the used quantity
    Usage,
    /// Show materials, take a rating and settle the session
    Settle,
    /// Check the backend credentials and exit
    CheckLogin,
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Command::Run => "run",
            Command::Login => "login",
            Command::Timer => "timer",
            Command::Usage => "usage",
            Command::Settle => "settle",
            Command::CheckLogin => "check-login",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = StationConfig::load_or_default(&cli.config);
    logging::init(cli.log_level.as_deref(), config.login.debug_mode);
    if let Some(e) = config_error {
        warn!(path = %cli.config.display(), error = %e, "Using default configuration");
    }

    let command = cli.command.unwrap_or(Command::Run);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    let next = runtime.block_on(commands::execute(command, config))?;
    drop(runtime);

    match next {
        Some(next) if !cli.no_chain => commands::chain(next, &cli),
        _ => Ok(()),
    }
}
