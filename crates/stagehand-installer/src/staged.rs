use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fs_utils::{remove_file_if_exists, write_atomically};
use crate::StateLayout;

/// A downloaded and extracted package waiting to be copied over its target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedUpgrade {
    #[serde(rename = "package_dir")]
    pub staging_dir: PathBuf,
    #[serde(rename = "workDirectory")]
    pub target_dir: PathBuf,
    pub version: String,
}

pub type ReadyMap = BTreeMap<String, StagedUpgrade>;

pub fn read_ready_map(layout: &StateLayout) -> Result<ReadyMap> {
    let path = layout.ready_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ReadyMap::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read ready state: {}", path.display()));
        }
    };

    if raw.trim().is_empty() {
        return Ok(ReadyMap::new());
    }

    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse ready state: {}", path.display()))
}

/// Persists the whole map. An empty map removes the file instead of leaving a placeholder.
pub fn write_ready_map(layout: &StateLayout, ready: &ReadyMap) -> Result<()> {
    let path = layout.ready_path();
    if ready.is_empty() {
        return remove_file_if_exists(&path)
            .with_context(|| format!("failed to remove ready state: {}", path.display()));
    }

    let content = serde_json::to_string_pretty(ready)
        .with_context(|| format!("failed to serialize ready state: {}", path.display()))?;
    write_atomically(&path, content.as_bytes())
        .with_context(|| format!("failed to write ready state: {}", path.display()))
}
