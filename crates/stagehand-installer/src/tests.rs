use super::*;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use stagehand_core::ArchiveType;

use crate::artifact::{
    build_powershell_expand_command, build_tar_fallback_command, build_tar_gz_extract_command,
    build_unzip_command, extract_archive_with_runner,
};
use crate::fs_utils::write_atomically;

static TEST_LAYOUT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn build_test_root(nanos: u128) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_LAYOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "stagehand-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

fn test_layout() -> StateLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let root = build_test_root(nanos);
    fs::create_dir_all(&root).expect("must create test root");
    let staging = root.join("tmp");
    fs::create_dir_all(&staging).expect("must create staging root");
    StateLayout::new(&root).with_staging_root(staging)
}

fn staged(version: &str) -> StagedUpgrade {
    StagedUpgrade {
        staging_dir: PathBuf::from("/tmp/upgrade-1"),
        target_dir: PathBuf::from("/opt/portal"),
        version: version.to_string(),
    }
}

fn command_args(command: &Command) -> Vec<String> {
    command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn layout_paths_live_under_root() {
    let layout = StateLayout::new("/opt/stagehand").with_staging_root("/var/tmp");
    assert_eq!(layout.ready_path(), Path::new("/opt/stagehand/upgrade.ready"));
    assert_eq!(layout.approvals_path(), Path::new("/opt/stagehand/upgrade.ok"));
    let download = layout.download_path("portal.zip");
    assert_eq!(download.parent(), Some(Path::new("/var/tmp")));
    assert!(download
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("-portal.zip")));
}

#[test]
fn download_paths_are_unique_for_the_same_file_name() {
    let layout = StateLayout::new("/opt/stagehand").with_staging_root("/var/tmp");
    let first = layout.download_path("package.tar.gz");
    let second = layout.download_path("package.tar.gz");
    assert_ne!(first, second);
    assert!(first.to_string_lossy().ends_with(".tar.gz"));
}

#[test]
fn layout_defaults_staging_root_to_system_temp() {
    let layout = StateLayout::new("/opt/stagehand");
    assert_eq!(layout.staging_root(), std::env::temp_dir().as_path());
}

#[test]
fn read_ready_map_missing_file_is_empty() {
    let layout = test_layout();
    let ready = read_ready_map(&layout).expect("missing file must not fail");
    assert!(ready.is_empty());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn read_ready_map_blank_file_is_empty() {
    let layout = test_layout();
    fs::write(layout.ready_path(), "  \n").expect("must write blank file");
    let ready = read_ready_map(&layout).expect("blank file must not fail");
    assert!(ready.is_empty());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn read_ready_map_rejects_corrupt_json() {
    let layout = test_layout();
    fs::write(layout.ready_path(), "{not json").expect("must write corrupt file");
    let err = read_ready_map(&layout).expect_err("corrupt state must surface");
    assert!(err.to_string().contains("failed to parse ready state"));
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn ready_map_persists_with_stable_keys() {
    let layout = test_layout();
    let mut ready = ReadyMap::new();
    ready.insert("portal".to_string(), staged("2.0.0"));
    write_ready_map(&layout, &ready).expect("must write ready map");

    let raw = fs::read_to_string(layout.ready_path()).expect("ready file exists");
    assert!(raw.contains("\"package_dir\""));
    assert!(raw.contains("\"workDirectory\""));
    assert!(raw.contains("\"version\": \"2.0.0\""));

    let loaded = read_ready_map(&layout).expect("must read ready map");
    assert_eq!(loaded, ready);
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn ready_map_reads_legacy_compact_json() {
    let layout = test_layout();
    fs::write(
        layout.ready_path(),
        r#"{"portal":{"workDirectory":"/opt/portal","package_dir":"/tmp/upgrade-1","version":"2.0.0"}}"#,
    )
    .expect("must write state");
    let loaded = read_ready_map(&layout).expect("must parse compact state");
    assert_eq!(loaded.get("portal"), Some(&staged("2.0.0")));
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn writing_empty_ready_map_deletes_file() {
    let layout = test_layout();
    let mut ready = ReadyMap::new();
    ready.insert("portal".to_string(), staged("2.0.0"));
    write_ready_map(&layout, &ready).expect("must write ready map");
    assert!(layout.ready_path().exists());

    write_ready_map(&layout, &ReadyMap::new()).expect("must clear ready map");
    assert!(!layout.ready_path().exists());

    write_ready_map(&layout, &ReadyMap::new()).expect("clearing twice is fine");
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn atomic_write_leaves_no_part_file() {
    let layout = test_layout();
    let path = layout.root().join("state.json");
    write_atomically(&path, b"first").expect("first write");
    write_atomically(&path, b"second").expect("overwrite");
    assert_eq!(fs::read_to_string(&path).expect("readable"), "second");
    assert!(!layout.root().join("state.json.part").exists());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn approvals_split_on_any_whitespace() {
    let layout = test_layout();
    fs::write(layout.approvals_path(), "portal  agent\n\tworker\r\n").expect("must write");
    let names = read_approvals(&layout).expect("must read approvals");
    assert_eq!(names, vec!["portal", "agent", "worker"]);
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn approvals_missing_file_is_empty() {
    let layout = test_layout();
    assert!(read_approvals(&layout).expect("must read").is_empty());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn write_approvals_uses_one_name_per_line() {
    let layout = test_layout();
    write_approvals(&layout, &["portal".to_string(), "agent".to_string()])
        .expect("must write approvals");
    assert_eq!(
        fs::read_to_string(layout.approvals_path()).expect("readable"),
        "portal\nagent\n"
    );
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn approve_is_idempotent() {
    let layout = test_layout();
    assert!(approve(&layout, "portal").expect("first approval"));
    assert!(!approve(&layout, "portal").expect("second approval"));
    assert!(approve(&layout, "agent").expect("other approval"));
    assert_eq!(
        read_approvals(&layout).expect("must read"),
        vec!["portal", "agent"]
    );
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn approve_rejects_names_with_whitespace() {
    let layout = test_layout();
    assert!(approve(&layout, "two words").is_err());
    assert!(approve(&layout, "   ").is_err());
    assert!(!layout.approvals_path().exists());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn removing_last_approval_deletes_file() {
    let layout = test_layout();
    approve(&layout, "portal").expect("approve portal");
    approve(&layout, "agent").expect("approve agent");

    remove_approval(&layout, "portal").expect("remove portal");
    assert_eq!(read_approvals(&layout).expect("must read"), vec!["agent"]);

    remove_approval(&layout, "agent").expect("remove agent");
    assert!(!layout.approvals_path().exists());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn copy_dir_recursive_overwrites_and_preserves_extras() {
    let layout = test_layout();
    let src = layout.root().join("src");
    let dst = layout.root().join("dst");
    fs::create_dir_all(src.join("bin")).expect("src tree");
    fs::create_dir_all(&dst).expect("dst tree");
    fs::write(src.join("bin").join("app"), "v2").expect("src file");
    fs::write(src.join("README"), "new readme").expect("src file");
    fs::write(dst.join("README"), "old readme").expect("dst file");
    fs::write(dst.join("settings.ini"), "keep me").expect("dst extra");

    copy_dir_recursive(&src, &dst).expect("copy must succeed");

    assert_eq!(fs::read_to_string(dst.join("bin").join("app")).expect("copied"), "v2");
    assert_eq!(fs::read_to_string(dst.join("README")).expect("copied"), "new readme");
    assert_eq!(
        fs::read_to_string(dst.join("settings.ini")).expect("untouched"),
        "keep me"
    );
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn copy_dir_recursive_rejects_missing_source() {
    let layout = test_layout();
    let err = copy_dir_recursive(&layout.root().join("absent"), &layout.root().join("dst"))
        .expect_err("missing source must fail");
    assert!(err.to_string().contains("not a directory"));
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn make_staging_dir_is_unique() {
    let layout = test_layout();
    let first = make_staging_dir(layout.staging_root(), "upgrade").expect("first");
    let second = make_staging_dir(layout.staging_root(), "upgrade").expect("second");
    assert_ne!(first, second);
    assert!(first.is_dir());
    assert!(second.is_dir());
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn tar_gz_extraction_uses_gzip_flag() {
    let command = build_tar_gz_extract_command(Path::new("/tmp/a.tar.gz"), Path::new("/tmp/out"));
    assert_eq!(command.get_program(), OsStr::new("tar"));
    assert_eq!(command_args(&command), vec!["-xzf", "/tmp/a.tar.gz", "-C", "/tmp/out"]);
}

#[test]
fn unzip_command_overwrites_quietly() {
    let command = build_unzip_command(Path::new("/tmp/a.zip"), Path::new("/tmp/out"));
    assert_eq!(command.get_program(), OsStr::new("unzip"));
    assert_eq!(command_args(&command), vec!["-o", "-q", "/tmp/a.zip", "-d", "/tmp/out"]);
}

#[test]
fn powershell_expand_escapes_single_quotes() {
    let command =
        build_powershell_expand_command(Path::new("C:/tmp/o'neil.zip"), Path::new("C:/out"));
    let args = command_args(&command);
    assert_eq!(args[0], "-NoProfile");
    assert!(args[2].contains("'C:/tmp/o''neil.zip'"));
}

#[test]
fn zip_extraction_falls_back_to_tar_when_unzip_fails() {
    let mut observed = Vec::new();
    extract_archive_with_runner(
        Path::new("/tmp/a.zip"),
        Path::new("/tmp/out"),
        ArchiveType::Zip,
        |command, context| {
            observed.push(command.get_program().to_string_lossy().into_owned());
            if context.contains("tar fallback") {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{context}: not installed"))
            }
        },
    )
    .expect("tar fallback should succeed");

    let expected: Vec<&str> = if cfg!(windows) {
        vec!["powershell", "unzip", "tar"]
    } else {
        vec!["unzip", "tar"]
    };
    assert_eq!(observed, expected);
    assert_eq!(
        command_args(&build_tar_fallback_command(
            Path::new("/tmp/a.zip"),
            Path::new("/tmp/out")
        )),
        vec!["-xf", "/tmp/a.zip", "-C", "/tmp/out"]
    );
}

#[test]
fn zip_extraction_reports_last_failure() {
    let err = extract_archive_with_runner(
        Path::new("/tmp/a.zip"),
        Path::new("/tmp/out"),
        ArchiveType::Zip,
        |_, context| Err(anyhow::anyhow!("{context}: boom")),
    )
    .expect_err("all strategies failing must fail");
    assert!(err.to_string().contains("tar fallback"));
}

#[cfg(unix)]
#[test]
fn extract_archive_unpacks_real_tar_gz() {
    let layout = test_layout();
    let payload = layout.root().join("payload");
    fs::create_dir_all(payload.join("bin")).expect("payload tree");
    fs::write(payload.join("bin").join("app"), "v2").expect("payload file");
    let archive = layout.root().join("portal.tar.gz");
    let status = Command::new("tar")
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(&payload)
        .arg(".")
        .status()
        .expect("tar must be available on unix hosts");
    assert!(status.success());

    let out = layout.root().join("out");
    extract_archive(&archive, &out, ArchiveType::TarGz).expect("extraction must succeed");
    assert_eq!(
        fs::read_to_string(out.join("bin").join("app")).expect("extracted file"),
        "v2"
    );
    let _ = fs::remove_dir_all(layout.root());
}
