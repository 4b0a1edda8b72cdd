use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use stagehand_core::{config_candidates, discover_config, DaemonConfig};
use stagehand_daemon::{
    check_for_upgrade, Scheduler, TaskRegistry, Toolkit, UpgradeContext, DEFAULT_TICK_PERIOD,
};
use stagehand_installer::{approve, read_approvals, read_ready_map, StateLayout};
use tracing::info;

use crate::render::{format_check_outcome, format_status_lines, TerminalRenderer};
use crate::service_install::{handle_service_action, ServiceDefinition};
use crate::shutdown::{run_until_stopped, wait_for_stop_signal};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let exe = std::env::current_exe().context("failed to resolve current executable")?;
    let state_dir = resolve_state_dir(cli.state_dir.as_deref(), &exe);
    let layout = StateLayout::new(&state_dir);
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Run => {
            let config_path = resolve_config_path(cli.config.as_deref(), &exe)?;
            let config = DaemonConfig::load(&config_path)?;
            fs::create_dir_all(layout.root())
                .with_context(|| format!("failed to create {}", layout.root().display()))?;

            let ctx = UpgradeContext::new(layout, Toolkit::system()?);
            info!(
                name = %config.name,
                config = %config_path.display(),
                state_dir = %state_dir.display(),
                "starting daemon"
            );
            let scheduler = Scheduler::new(ctx, TaskRegistry::new(), config.services, config.packages);
            let handle = scheduler
                .spawn(DEFAULT_TICK_PERIOD)
                .context("failed to start scheduler thread")?;
            run_until_stopped(handle, wait_for_stop_signal)?;
        }
        Commands::Approve { name } => {
            fs::create_dir_all(layout.root())
                .with_context(|| format!("failed to create {}", layout.root().display()))?;
            if approve(&layout, &name)? {
                renderer.print_status("ok", &format!("approved upgrade of {name}"));
            } else {
                renderer.print_status("ok", &format!("{name} was already approved"));
            }
        }
        Commands::Status => {
            let ready = read_ready_map(&layout)?;
            let approvals = read_approvals(&layout)?;
            renderer.print_lines(&format_status_lines(&ready, &approvals, renderer.style()));
        }
        Commands::Check { name } => {
            let config_path = resolve_config_path(cli.config.as_deref(), &exe)?;
            let config = DaemonConfig::load(&config_path)?;
            let package = config
                .find_package(&name)
                .ok_or_else(|| anyhow!("no package named '{name}' in {}", config_path.display()))?;
            if !package.is_eligible() {
                anyhow::bail!(
                    "package '{name}' needs uriCheckVersion, uriDownloadPackage, workDirectory and commandGetVersion"
                );
            }
            fs::create_dir_all(layout.root())
                .with_context(|| format!("failed to create {}", layout.root().display()))?;

            let ctx = UpgradeContext::new(layout, Toolkit::system()?);
            let outcome = check_for_upgrade(&ctx, package)?;
            println!("{}", format_check_outcome(&name, &outcome, renderer.style()));
        }
        Commands::Service { action } => {
            let config_path = resolve_config_path(cli.config.as_deref(), &exe)?;
            let config = DaemonConfig::load(&config_path)?;
            let config_path = absolute(&config_path)?;
            let state_dir = absolute(&state_dir)?;
            let definition = ServiceDefinition::from_config(&config, &exe, &config_path, &state_dir);
            handle_service_action(action, &definition, renderer)?;
        }
    }

    Ok(())
}

/// An explicit `--config` wins; otherwise the first existing candidate next to `exe`.
pub(crate) fn resolve_config_path(explicit: Option<&Path>, exe: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    discover_config(exe).ok_or_else(|| {
        let tried = config_candidates(exe)
            .iter()
            .map(|candidate| candidate.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!("no configuration file found (tried {tried}); pass --config")
    })
}

pub(crate) fn resolve_state_dir(explicit: Option<&Path>, exe: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    exe.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}
