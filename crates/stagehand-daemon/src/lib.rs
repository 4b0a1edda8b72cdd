mod command;
mod orchestrator;
mod registry;
mod remote;
mod scheduler;
mod service;
mod toolkit;

pub use command::{parse_command_line, CommandRunner, SystemCommandRunner};
pub use orchestrator::{
    apply_staged_upgrade, check_for_upgrade, ensure_service_running, ApplyOutcome, CheckOutcome,
    LivenessOutcome, UpgradeContext,
};
pub use registry::{TaskGuard, TaskPhase, TaskRegistry};
pub use remote::{file_name_from_url, HttpRemoteClient, RemoteClient};
pub use scheduler::{Scheduler, SchedulerHandle, DEFAULT_TICK_PERIOD};
pub use service::{ServiceControl, ServiceStatus, SystemServiceControl};
pub use toolkit::{ArchiveExtractor, SystemArchiveExtractor, Toolkit};
