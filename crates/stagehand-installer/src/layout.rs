use std::path::{Path, PathBuf};

use crate::artifact::unique_token;

pub const READY_FILE_NAME: &str = "upgrade.ready";
pub const APPROVALS_FILE_NAME: &str = "upgrade.ok";

/// Where the daemon keeps its durable state and where it stages downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
    staging_root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging_root: std::env::temp_dir(),
        }
    }

    pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = staging_root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn ready_path(&self) -> PathBuf {
        self.root.join(READY_FILE_NAME)
    }

    pub fn approvals_path(&self) -> PathBuf {
        self.root.join(APPROVALS_FILE_NAME)
    }

    /// A fresh archive path under the staging root. Two runs never share one, even
    /// when their URLs end in the same file name; `file_name` stays last so the
    /// extension survives.
    pub fn download_path(&self, file_name: &str) -> PathBuf {
        self.staging_root
            .join(format!("download-{}-{file_name}", unique_token()))
    }
}
