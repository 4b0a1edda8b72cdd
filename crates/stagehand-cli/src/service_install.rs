use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use stagehand_core::DaemonConfig;

use crate::render::TerminalRenderer;
use crate::ServiceAction;

const UNSUPPORTED: &str = "service management is supported on Linux and macOS only";

/// How the daemon registers itself with the host service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceDefinition {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) program_arguments: Vec<String>,
    pub(crate) username: Option<String>,
    pub(crate) working_directory: Option<PathBuf>,
}

impl ServiceDefinition {
    /// The installed service runs `stagehand run` against the same config and state
    /// directory this invocation resolved. Configured `arguments` go in front of the
    /// subcommand so they reach the global options.
    pub(crate) fn from_config(
        config: &DaemonConfig,
        executable: &Path,
        config_path: &Path,
        state_dir: &Path,
    ) -> Self {
        let mut program_arguments = vec![
            executable.display().to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
            "--state-dir".to_string(),
            state_dir.display().to_string(),
        ];
        program_arguments.extend(config.arguments.iter().cloned());
        program_arguments.push("run".to_string());

        let description = config
            .description
            .clone()
            .or_else(|| config.display_name.clone())
            .unwrap_or_else(|| config.name.clone());

        Self {
            name: config.name.clone(),
            description,
            program_arguments,
            username: config.username.clone().filter(|name| !name.trim().is_empty()),
            working_directory: config.working_directory.clone(),
        }
    }
}

pub(crate) fn handle_service_action(
    action: ServiceAction,
    definition: &ServiceDefinition,
    renderer: TerminalRenderer,
) -> Result<()> {
    match action {
        ServiceAction::Install => install(definition, renderer),
        ServiceAction::Uninstall => uninstall(definition, renderer),
        ServiceAction::Start => start(definition, renderer),
        ServiceAction::Stop => stop(definition, renderer),
        ServiceAction::Status => status(definition, renderer),
    }
}

fn install(definition: &ServiceDefinition, renderer: TerminalRenderer) -> Result<()> {
    let (file, content) = if cfg!(target_os = "linux") {
        (linux_unit_file(&definition.name), render_systemd_unit(definition))
    } else if cfg!(target_os = "macos") {
        (macos_plist_file(&definition.name), render_launchd_plist(definition))
    } else {
        anyhow::bail!(UNSUPPORTED);
    };

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&file, content).with_context(|| format!("failed to write {}", file.display()))?;

    if cfg!(target_os = "linux") {
        run_checked(Command::new("systemctl").arg("daemon-reload"))?;
        run_checked(Command::new("systemctl").args(["enable", &unit_name(&definition.name)]))?;
    }
    renderer.print_status("ok", &format!("installed service: {}", file.display()));
    Ok(())
}

fn uninstall(definition: &ServiceDefinition, renderer: TerminalRenderer) -> Result<()> {
    let file = if cfg!(target_os = "linux") {
        let unit = unit_name(&definition.name);
        let _ = run_checked(Command::new("systemctl").args(["stop", &unit]));
        let _ = run_checked(Command::new("systemctl").args(["disable", &unit]));
        linux_unit_file(&definition.name)
    } else if cfg!(target_os = "macos") {
        let file = macos_plist_file(&definition.name);
        let _ = run_checked(Command::new("launchctl").arg("unload").arg("-w").arg(&file));
        file
    } else {
        anyhow::bail!(UNSUPPORTED);
    };

    if file.exists() {
        fs::remove_file(&file).with_context(|| format!("failed to remove {}", file.display()))?;
    }
    if cfg!(target_os = "linux") {
        let _ = run_checked(Command::new("systemctl").arg("daemon-reload"));
    }
    renderer.print_status("ok", &format!("uninstalled service: {}", file.display()));
    Ok(())
}

fn start(definition: &ServiceDefinition, renderer: TerminalRenderer) -> Result<()> {
    if cfg!(target_os = "linux") {
        run_checked(Command::new("systemctl").args(["start", &unit_name(&definition.name)]))?;
    } else if cfg!(target_os = "macos") {
        let file = macos_plist_file(&definition.name);
        run_checked(Command::new("launchctl").arg("load").arg("-w").arg(&file))?;
        run_checked(Command::new("launchctl").args(["start", &definition.name]))?;
    } else {
        anyhow::bail!(UNSUPPORTED);
    }
    renderer.print_status("ok", &format!("started {}", definition.name));
    Ok(())
}

fn stop(definition: &ServiceDefinition, renderer: TerminalRenderer) -> Result<()> {
    if cfg!(target_os = "linux") {
        run_checked(Command::new("systemctl").args(["stop", &unit_name(&definition.name)]))?;
    } else if cfg!(target_os = "macos") {
        let file = macos_plist_file(&definition.name);
        let _ = run_checked(Command::new("launchctl").args(["stop", &definition.name]));
        run_checked(Command::new("launchctl").arg("unload").arg("-w").arg(&file))?;
    } else {
        anyhow::bail!(UNSUPPORTED);
    }
    renderer.print_status("ok", &format!("stopped {}", definition.name));
    Ok(())
}

fn status(definition: &ServiceDefinition, renderer: TerminalRenderer) -> Result<()> {
    if cfg!(target_os = "linux") {
        let state = run_capture(
            Command::new("systemctl").args(["is-active", &unit_name(&definition.name)]),
        )
        .unwrap_or_else(|_| "unknown".to_string());
        let state = state.trim();
        let badge = if state == "active" { "ok" } else { "warn" };
        renderer.print_status(badge, &format!("{}: {state}", definition.name));
        renderer.print_status("ok", &format!("unit: {}", linux_unit_file(&definition.name).display()));
        return Ok(());
    }
    if cfg!(target_os = "macos") {
        let out = run_capture(Command::new("launchctl").arg("list"))?;
        let loaded = out
            .lines()
            .any(|line| line.split_whitespace().nth(2) == Some(definition.name.as_str()));
        if loaded {
            renderer.print_status("ok", &format!("{}: loaded", definition.name));
        } else {
            renderer.print_status("warn", &format!("{}: not loaded", definition.name));
        }
        return Ok(());
    }
    anyhow::bail!(UNSUPPORTED)
}

fn unit_name(name: &str) -> String {
    format!("{name}.service")
}

pub(crate) fn linux_unit_file(name: &str) -> PathBuf {
    PathBuf::from("/etc/systemd/system").join(unit_name(name))
}

pub(crate) fn macos_plist_file(name: &str) -> PathBuf {
    PathBuf::from("/Library/LaunchDaemons").join(format!("{name}.plist"))
}

pub(crate) fn render_systemd_unit(definition: &ServiceDefinition) -> String {
    let exec_start = definition
        .program_arguments
        .iter()
        .map(|arg| quote_systemd_arg(arg))
        .collect::<Vec<_>>()
        .join(" ");

    let mut unit = format!(
        "[Unit]\nDescription={}\nAfter=network-online.target\nWants=network-online.target\n\n[Service]\nType=simple\nExecStart={exec_start}\n",
        definition.description
    );
    if let Some(dir) = &definition.working_directory {
        unit.push_str(&format!("WorkingDirectory={}\n", dir.display()));
    }
    if let Some(user) = &definition.username {
        unit.push_str(&format!("User={user}\n"));
    }
    unit.push_str("Restart=always\nRestartSec=3\n\n[Install]\nWantedBy=multi-user.target\n");
    unit
}

fn quote_systemd_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

pub(crate) fn render_launchd_plist(definition: &ServiceDefinition) -> String {
    let arguments = definition
        .program_arguments
        .iter()
        .map(|arg| format!("    <string>{}</string>\n", xml_escape(arg)))
        .collect::<String>();

    let mut optional = String::new();
    if let Some(dir) = &definition.working_directory {
        optional.push_str(&format!(
            "  <key>WorkingDirectory</key>\n  <string>{}</string>\n",
            xml_escape(&dir.display().to_string())
        ));
    }
    if let Some(user) = &definition.username {
        optional.push_str(&format!(
            "  <key>UserName</key>\n  <string>{}</string>\n",
            xml_escape(user)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{arguments}  </array>
{optional}  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
</dict>
</plist>
"#,
        label = xml_escape(&definition.name),
    )
}

pub(crate) fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn run_checked(command: &mut Command) -> Result<()> {
    let output = command.output().context("failed to spawn service manager")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("service manager command failed: {}", stderr.trim());
    }
    Ok(())
}

fn run_capture(command: &mut Command) -> Result<String> {
    let output = command.output().context("failed to spawn service manager")?;
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        text = String::from_utf8_lossy(&output.stderr).to_string();
    }
    Ok(text)
}
