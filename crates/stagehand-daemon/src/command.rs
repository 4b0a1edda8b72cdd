use std::process::Command;

use anyhow::{anyhow, Context, Result};

/// Runs the local version command of a package.
pub trait CommandRunner: Send + Sync {
    /// Runs `line` and returns its stdout.
    fn run_command_line(&self, line: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run_command_line(&self, line: &str) -> Result<String> {
        let (program, args) = parse_command_line(line)?;
        let output = Command::new(&program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to start command: {program}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "command '{line}' exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Splits a command line into program and arguments.
///
/// `"C:\Program Files\app.exe" --version` keeps the quoted executable whole; anything
/// else is split on whitespace.
pub fn parse_command_line(line: &str) -> Result<(String, Vec<String>)> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix('"') {
        let Some(end) = rest.find('"') else {
            return Err(anyhow!("unterminated quote in command: {line}"));
        };
        let program = &rest[..end];
        if program.is_empty() {
            return Err(anyhow!("empty executable in command: {line}"));
        }
        let args = rest[end + 1..]
            .split_whitespace()
            .map(str::to_string)
            .collect();
        return Ok((program.to_string(), args));
    }

    let mut tokens = trimmed.split_whitespace().map(str::to_string);
    let program = tokens
        .next()
        .ok_or_else(|| anyhow!("command line is empty"))?;
    Ok((program, tokens.collect()))
}
