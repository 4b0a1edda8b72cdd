use std::process::Command;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

/// Host process/service control for managed targets.
pub trait ServiceControl: Send + Sync {
    fn status(&self, name: &str) -> Result<ServiceStatus>;
    fn start(&self, name: &str) -> Result<()>;
}

/// Talks to the host service manager: systemd on Linux, launchd on macOS, the
/// service control manager on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemServiceControl;

impl ServiceControl for SystemServiceControl {
    fn status(&self, name: &str) -> Result<ServiceStatus> {
        if cfg!(target_os = "linux") {
            let out = run_capture(Command::new("systemctl").args(["is-active", name]))?;
            return Ok(parse_systemctl_state(&out));
        }
        if cfg!(target_os = "macos") {
            let out = run_capture(Command::new("launchctl").arg("list"))?;
            return Ok(parse_launchctl_list(&out, name));
        }
        if cfg!(windows) {
            let out = run_capture(Command::new("sc").args(["query", name]))?;
            return Ok(parse_sc_query(&out));
        }
        Err(anyhow!("service control is not supported on this platform"))
    }

    fn start(&self, name: &str) -> Result<()> {
        if cfg!(target_os = "linux") {
            return run_checked(Command::new("systemctl").args(["start", name]));
        }
        if cfg!(target_os = "macos") {
            return run_checked(Command::new("launchctl").args(["start", name]));
        }
        if cfg!(windows) {
            return run_checked(Command::new("sc").args(["start", name]));
        }
        Err(anyhow!("service control is not supported on this platform"))
    }
}

pub(crate) fn parse_systemctl_state(output: &str) -> ServiceStatus {
    match output.trim() {
        "active" | "reloading" | "activating" => ServiceStatus::Running,
        "inactive" | "failed" | "deactivating" => ServiceStatus::Stopped,
        _ => ServiceStatus::Unknown,
    }
}

/// `launchctl list` prints `PID Status Label`; a `-` PID means loaded but not running.
pub(crate) fn parse_launchctl_list(output: &str, label: &str) -> ServiceStatus {
    for line in output.lines() {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 3 || columns[2] != label {
            continue;
        }
        if columns[0] == "-" {
            return ServiceStatus::Stopped;
        }
        return ServiceStatus::Running;
    }
    ServiceStatus::Unknown
}

pub(crate) fn parse_sc_query(output: &str) -> ServiceStatus {
    let Some(state_line) = output.lines().find(|line| line.trim_start().starts_with("STATE")) else {
        return ServiceStatus::Unknown;
    };
    if state_line.contains("RUNNING") {
        ServiceStatus::Running
    } else if state_line.contains("STOPPED") {
        ServiceStatus::Stopped
    } else {
        ServiceStatus::Unknown
    }
}

fn run_checked(command: &mut Command) -> Result<()> {
    let output = command.output().context("failed to spawn service manager")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("service manager command failed: {}", stderr.trim());
    }
    Ok(())
}

// Status queries exit non-zero for stopped units, so only a spawn failure is an error.
fn run_capture(command: &mut Command) -> Result<String> {
    let output = command.output().context("failed to spawn service manager")?;
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        text = String::from_utf8_lossy(&output.stderr).to_string();
    }
    Ok(text)
}
