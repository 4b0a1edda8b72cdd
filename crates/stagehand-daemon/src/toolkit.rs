use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use stagehand_core::ArchiveType;
use stagehand_installer::extract_archive;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::remote::{HttpRemoteClient, RemoteClient};
use crate::service::{ServiceControl, SystemServiceControl};

pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive_path: &Path, dest: &Path, archive_type: ArchiveType) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemArchiveExtractor;

impl ArchiveExtractor for SystemArchiveExtractor {
    fn extract(&self, archive_path: &Path, dest: &Path, archive_type: ArchiveType) -> Result<()> {
        extract_archive(archive_path, dest, archive_type)
    }
}

/// The I/O collaborators every orchestrator action goes through.
#[derive(Clone)]
pub struct Toolkit {
    pub services: Arc<dyn ServiceControl>,
    pub remote: Arc<dyn RemoteClient>,
    pub commands: Arc<dyn CommandRunner>,
    pub archives: Arc<dyn ArchiveExtractor>,
}

impl Toolkit {
    pub fn system() -> Result<Self> {
        Ok(Self {
            services: Arc::new(SystemServiceControl),
            remote: Arc::new(HttpRemoteClient::new()?),
            commands: Arc::new(SystemCommandRunner),
            archives: Arc::new(SystemArchiveExtractor),
        })
    }
}
