mod archive;
mod config;
mod version;

pub use archive::ArchiveType;
pub use config::{
    config_candidates, discover_config, parse_interval, DaemonConfig, PackageTarget,
    ServiceTarget, PACKAGE_INTERVAL_FALLBACK, PACKAGE_INTERVAL_THRESHOLD,
    SERVICE_INTERVAL_FLOOR,
};
pub use version::{compare_versions, PackageVersion};
