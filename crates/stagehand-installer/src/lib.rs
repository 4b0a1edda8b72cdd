mod approvals;
mod artifact;
mod fs_utils;
mod layout;
mod staged;

pub use approvals::{approve, read_approvals, remove_approval, write_approvals};
pub use artifact::{copy_dir_recursive, extract_archive, make_staging_dir};
pub use fs_utils::{remove_dir_if_exists, remove_file_if_exists};
pub use layout::{StateLayout, APPROVALS_FILE_NAME, READY_FILE_NAME};
pub use staged::{read_ready_map, write_ready_map, ReadyMap, StagedUpgrade};

#[cfg(test)]
mod tests;
