use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use stagehand_core::ArchiveType;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn extract_archive(archive_path: &Path, dst: &Path, archive_type: ArchiveType) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    extract_archive_with_runner(archive_path, dst, archive_type, run_command)
}

pub(crate) fn extract_archive_with_runner<RunCommand>(
    archive_path: &Path,
    dst: &Path,
    archive_type: ArchiveType,
    mut run: RunCommand,
) -> Result<()>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    match archive_type {
        ArchiveType::TarGz => run(
            &mut build_tar_gz_extract_command(archive_path, dst),
            "failed to extract tar.gz archive",
        ),
        ArchiveType::Zip => {
            if cfg!(windows)
                && run(
                    &mut build_powershell_expand_command(archive_path, dst),
                    "failed to extract zip archive with powershell",
                )
                .is_ok()
            {
                return Ok(());
            }

            if run(
                &mut build_unzip_command(archive_path, dst),
                "failed to extract zip archive with unzip",
            )
            .is_ok()
            {
                return Ok(());
            }

            run(
                &mut build_tar_fallback_command(archive_path, dst),
                "failed to extract zip archive with tar fallback",
            )
        }
    }
}

pub(crate) fn build_tar_gz_extract_command(archive_path: &Path, dst: &Path) -> Command {
    let mut command = Command::new("tar");
    command.arg("-xzf").arg(archive_path).arg("-C").arg(dst);
    command
}

pub(crate) fn build_unzip_command(archive_path: &Path, dst: &Path) -> Command {
    let mut command = Command::new("unzip");
    command.arg("-o").arg("-q").arg(archive_path).arg("-d").arg(dst);
    command
}

pub(crate) fn build_tar_fallback_command(archive_path: &Path, dst: &Path) -> Command {
    let mut command = Command::new("tar");
    command.arg("-xf").arg(archive_path).arg("-C").arg(dst);
    command
}

pub(crate) fn build_powershell_expand_command(archive_path: &Path, dst: &Path) -> Command {
    let mut command = Command::new("powershell");
    command.arg("-NoProfile").arg("-Command").arg(format!(
        "Expand-Archive -LiteralPath '{}' -DestinationPath '{}' -Force",
        escape_ps_single_quote(archive_path),
        escape_ps_single_quote(dst)
    ));
    command
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

fn escape_ps_single_quote(path: &Path) -> String {
    let mut os = OsString::new();
    os.push(path.as_os_str());
    os.to_string_lossy().replace('\'', "''")
}

/// Copies the contents of `src` into `dst`, creating directories and overwriting files.
/// Files already in `dst` that `src` does not carry are left in place.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        anyhow::bail!("copy source is not a directory: {}", src.display());
    }

    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }

        #[cfg(unix)]
        if metadata.file_type().is_symlink() {
            let target = fs::read_link(&src_path)
                .with_context(|| format!("failed to read symlink {}", src_path.display()))?;
            if fs::symlink_metadata(&dst_path).is_ok() {
                fs::remove_file(&dst_path)
                    .with_context(|| format!("failed to replace {}", dst_path.display()))?;
            }
            std::os::unix::fs::symlink(&target, &dst_path).with_context(|| {
                format!(
                    "failed to create symlink {} -> {}",
                    dst_path.display(),
                    target.display()
                )
            })?;
            continue;
        }

        fs::copy(&src_path, &dst_path).with_context(|| {
            format!(
                "failed to copy {} to {}",
                src_path.display(),
                dst_path.display()
            )
        })?;
    }
    Ok(())
}

/// `pid-nanos-counter`, distinct for every call within and across processes.
pub(crate) fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let sequence = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", std::process::id(), nanos, sequence)
}

/// Creates a fresh, uniquely named directory under `root`.
pub fn make_staging_dir(root: &Path, prefix: &str) -> Result<PathBuf> {
    let dir = root.join(format!("{prefix}-{}", unique_token()));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed creating staging dir: {}", dir.display()))?;
    Ok(dir)
}
