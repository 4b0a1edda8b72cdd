use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod dispatch;
mod render;
mod service_install;
mod shutdown;

use dispatch::run_cli;

const LOG_ENV_VAR: &str = "STAGEHAND_LOG";

#[derive(Parser, Debug)]
#[command(name = "stagehand", version)]
#[command(about = "Keeps services alive and stages package upgrades", long_about = None)]
struct Cli {
    /// Daemon configuration file; defaults to a config next to the executable.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the ready and approval files; defaults to the executable's directory.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler in the foreground until SIGINT or SIGTERM.
    Run,
    /// Approve the staged upgrade of a package.
    Approve { name: String },
    /// Show staged upgrades and pending approvals.
    Status,
    /// Check one configured package for an upgrade right now.
    ///
    /// Runs outside the daemon's task registry; avoid targets a running daemon is
    /// checking at the same moment.
    Check { name: String },
    /// Manage the daemon's own system service.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceAction {
    Install,
    Uninstall,
    Start,
    Stop,
    Status,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
