use std::fs;
use std::io;

use anyhow::{Context, Result};

use crate::fs_utils::{remove_file_if_exists, write_atomically};
use crate::StateLayout;

pub fn read_approvals(layout: &StateLayout) -> Result<Vec<String>> {
    let path = layout.approvals_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read approval list: {}", path.display()));
        }
    };

    Ok(raw.split_whitespace().map(str::to_string).collect())
}

pub fn write_approvals(layout: &StateLayout, names: &[String]) -> Result<()> {
    let path = layout.approvals_path();
    if names.is_empty() {
        return remove_file_if_exists(&path)
            .with_context(|| format!("failed to remove approval list: {}", path.display()));
    }

    let mut payload = names.join("\n");
    payload.push('\n');
    write_atomically(&path, payload.as_bytes())
        .with_context(|| format!("failed to write approval list: {}", path.display()))
}

/// Records the external "safe to apply" signal for `name`. Returns false if it was already there.
pub fn approve(layout: &StateLayout, name: &str) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        anyhow::bail!("approval name must be a single non-empty token: '{name}'");
    }

    let mut names = read_approvals(layout)?;
    if names.iter().any(|existing| existing == name) {
        return Ok(false);
    }
    names.push(name.to_string());
    write_approvals(layout, &names)?;
    Ok(true)
}

/// Drops every occurrence of `name` and persists the remainder.
pub fn remove_approval(layout: &StateLayout, name: &str) -> Result<()> {
    let mut names = read_approvals(layout)?;
    names.retain(|existing| existing != name);
    write_approvals(layout, &names)
}
