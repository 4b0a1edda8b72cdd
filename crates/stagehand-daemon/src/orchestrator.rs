use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use stagehand_core::{compare_versions, ArchiveType, PackageTarget};
use stagehand_installer::{
    copy_dir_recursive, make_staging_dir, read_ready_map, remove_approval, remove_dir_if_exists,
    remove_file_if_exists, write_ready_map, StagedUpgrade, StateLayout,
};
use tracing::{debug, info, warn};

use crate::remote::file_name_from_url;
use crate::service::ServiceStatus;
use crate::toolkit::Toolkit;

/// Everything an action needs, passed explicitly instead of living in globals.
#[derive(Clone)]
pub struct UpgradeContext {
    pub layout: StateLayout,
    pub toolkit: Toolkit,
}

impl UpgradeContext {
    pub fn new(layout: StateLayout, toolkit: Toolkit) -> Self {
        Self { layout, toolkit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessOutcome {
    AlreadyRunning,
    Started,
    StatusUnknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Remote is not strictly newer, or one side is not a comparable version.
    UpToDate { local: String, remote: String },
    /// A staged upgrade at or above the remote version is already waiting.
    AlreadyStaged { version: String },
    Staged { staging_dir: PathBuf, version: String },
    Applied { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    NothingStaged,
    Applied { version: String },
    /// The staging directory disappeared (e.g. temp cleanup on reboot); the record was
    /// dropped so the next check downloads the package again.
    StagingMissing { version: String },
}

pub fn ensure_service_running(ctx: &UpgradeContext, name: &str) -> Result<LivenessOutcome> {
    let status = ctx
        .toolkit
        .services
        .status(name)
        .with_context(|| format!("failed to query status of service '{name}'"))?;
    match status {
        ServiceStatus::Running => Ok(LivenessOutcome::AlreadyRunning),
        ServiceStatus::Unknown => Ok(LivenessOutcome::StatusUnknown),
        ServiceStatus::Stopped => {
            ctx.toolkit
                .services
                .start(name)
                .with_context(|| format!("start service {name}"))?;
            info!(service = name, "service was stopped and has been started");
            Ok(LivenessOutcome::Started)
        }
    }
}

pub fn check_for_upgrade(ctx: &UpgradeContext, package: &PackageTarget) -> Result<CheckOutcome> {
    let name = package.name.as_str();
    let work_dir = package.work_dir_path();
    if !work_dir.is_dir() {
        return Err(anyhow!(
            "work directory for '{name}' is missing or not a directory: {}",
            work_dir.display()
        ));
    }
    let file_name = file_name_from_url(&package.download_url)?;

    let remote_version = ctx
        .toolkit
        .remote
        .fetch_text(&package.check_version_url)
        .with_context(|| format!("failed to fetch remote version for '{name}'"))?;
    let local_output = ctx
        .toolkit
        .commands
        .run_command_line(&package.version_command)
        .with_context(|| format!("failed to read local version for '{name}'"))?;
    let local_version = local_output.trim();

    if compare_versions(&remote_version, local_version) != Some(Ordering::Greater) {
        debug!(package = name, local = local_version, remote = %remote_version, "no newer version");
        return Ok(CheckOutcome::UpToDate {
            local: local_version.to_string(),
            remote: remote_version,
        });
    }

    let ready = read_ready_map(&ctx.layout)?;
    if let Some(existing) = ready.get(name) {
        if matches!(
            compare_versions(&existing.version, &remote_version),
            Some(Ordering::Greater | Ordering::Equal)
        ) {
            debug!(package = name, version = %existing.version, "upgrade already staged");
            return Ok(CheckOutcome::AlreadyStaged {
                version: existing.version.clone(),
            });
        }
    }

    let archive_type = ArchiveType::infer_from_file_name(&file_name)
        .ok_or_else(|| anyhow!("not supported type: '{file_name}' for '{name}'"))?;

    let staging_dir = match make_staging_dir(ctx.layout.staging_root(), "upgrade") {
        Ok(dir) => dir,
        Err(err) => {
            warn!(package = name, "falling back to staging root: {err:#}");
            ctx.layout.staging_root().to_path_buf()
        }
    };

    let archive_path = ctx.layout.download_path(&file_name);
    let staged = fetch_and_extract(ctx, package, &archive_path, &staging_dir, archive_type);
    if let Err(err) = staged {
        let _ = remove_file_if_exists(&archive_path);
        discard_staging_dir(&ctx.layout, &staging_dir);
        return Err(err);
    }
    if let Err(err) = remove_file_if_exists(&archive_path) {
        warn!(package = name, "failed to remove {}: {err}", archive_path.display());
    }
    info!(package = name, dir = %staging_dir.display(), "new version download completed");

    if package.needs_shutdown {
        let mut ready = read_ready_map(&ctx.layout)?;
        let previous = ready.insert(
            name.to_string(),
            StagedUpgrade {
                staging_dir: staging_dir.clone(),
                target_dir: work_dir.to_path_buf(),
                version: remote_version.clone(),
            },
        );
        if let Err(err) = write_ready_map(&ctx.layout, &ready) {
            discard_staging_dir(&ctx.layout, &staging_dir);
            return Err(err);
        }
        if let Some(previous) = previous {
            if previous.staging_dir != staging_dir {
                info!(package = name, superseded = %previous.version, "replacing older staged upgrade");
                discard_staging_dir(&ctx.layout, &previous.staging_dir);
            }
        }
        info!(package = name, version = %remote_version, "upgrade ready");
        return Ok(CheckOutcome::Staged {
            staging_dir,
            version: remote_version,
        });
    }

    let installed = copy_dir_recursive(&staging_dir, work_dir)
        .with_context(|| format!("failed to install '{name}' into {}", work_dir.display()));
    discard_staging_dir(&ctx.layout, &staging_dir);
    installed?;
    info!(package = name, version = %remote_version, "upgrade completed");
    Ok(CheckOutcome::Applied {
        version: remote_version,
    })
}

fn fetch_and_extract(
    ctx: &UpgradeContext,
    package: &PackageTarget,
    archive_path: &Path,
    staging_dir: &Path,
    archive_type: ArchiveType,
) -> Result<()> {
    ctx.toolkit
        .remote
        .download(&package.download_url, archive_path)
        .with_context(|| format!("failed to download package for '{}'", package.name))?;
    info!(package = %package.name, "find new version");
    ctx.toolkit
        .archives
        .extract(archive_path, staging_dir, archive_type)
        .with_context(|| {
            format!(
                "failed to extract {} for '{}'",
                archive_path.display(),
                package.name
            )
        })
}

pub fn apply_staged_upgrade(ctx: &UpgradeContext, name: &str) -> Result<ApplyOutcome> {
    let ready = read_ready_map(&ctx.layout)?;
    let Some(staged) = ready.get(name).cloned() else {
        debug!(package = name, "approval without a staged upgrade");
        return Ok(ApplyOutcome::NothingStaged);
    };

    if !staged.staging_dir.is_dir() {
        let mut ready = ready;
        ready.remove(name);
        write_ready_map(&ctx.layout, &ready)?;
        warn!(
            package = name,
            dir = %staged.staging_dir.display(),
            "staging directory is gone, dropped staged record"
        );
        return Ok(ApplyOutcome::StagingMissing {
            version: staged.version,
        });
    }

    copy_dir_recursive(&staged.staging_dir, &staged.target_dir).with_context(|| {
        format!(
            "failed to apply staged upgrade of '{name}' into {}",
            staged.target_dir.display()
        )
    })?;
    discard_staging_dir(&ctx.layout, &staged.staging_dir);

    remove_approval(&ctx.layout, name)?;
    let mut ready = read_ready_map(&ctx.layout)?;
    ready.remove(name);
    write_ready_map(&ctx.layout, &ready)?;

    info!(package = name, version = %staged.version, "upgrade completed");
    Ok(ApplyOutcome::Applied {
        version: staged.version,
    })
}

/// Removes a staging directory, never the shared staging root itself.
fn discard_staging_dir(layout: &StateLayout, dir: &Path) {
    if dir == layout.staging_root() {
        return;
    }
    if let Err(err) = remove_dir_if_exists(dir) {
        warn!("failed to remove staging dir {}: {err}", dir.display());
    }
}
