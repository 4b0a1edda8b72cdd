use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stagehand_core::{PackageTarget, ServiceTarget};
use stagehand_installer::read_approvals;
use tracing::{debug, error, info};

use crate::orchestrator::{
    apply_staged_upgrade, check_for_upgrade, ensure_service_running, ApplyOutcome, CheckOutcome,
    LivenessOutcome, UpgradeContext,
};
use crate::registry::{TaskGuard, TaskPhase, TaskRegistry};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Fixed-period driver that launches orchestrator actions without waiting on them.
pub struct Scheduler {
    ctx: Arc<UpgradeContext>,
    registry: Arc<TaskRegistry>,
    services: Vec<ServiceTarget>,
    packages: Vec<PackageTarget>,
    tick: u64,
}

impl Scheduler {
    pub fn new(
        ctx: UpgradeContext,
        registry: Arc<TaskRegistry>,
        services: Vec<ServiceTarget>,
        packages: Vec<PackageTarget>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            registry,
            services,
            packages,
            tick: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Runs one tick and returns the handles of the actions it launched.
    ///
    /// Production callers drop the handles; the registry is the only thing that
    /// tracks whether an action is still running.
    pub fn run_tick(&mut self) -> Vec<JoinHandle<()>> {
        let mut launched = Vec::new();

        match read_approvals(&self.ctx.layout) {
            Ok(names) => {
                for name in names {
                    if let Some(guard) =
                        self.registry
                            .try_acquire(&name, TaskPhase::ApplyingStagedUpgrade)
                    {
                        launched.extend(self.launch(guard, run_apply));
                    }
                }
            }
            Err(err) => error!("failed to read approval list: {err:#}"),
        }

        for service in &self.services {
            if self.tick % service.interval_ticks() != 0 {
                continue;
            }
            if let Some(guard) = self
                .registry
                .try_acquire(&service.name, TaskPhase::VerifyingLiveness)
            {
                launched.extend(self.launch(guard, run_liveness));
            }
        }

        for package in &self.packages {
            if !package.is_eligible() || self.tick % package.interval_ticks() != 0 {
                continue;
            }
            if let Some(guard) = self.registry.try_preempt(
                &package.name,
                TaskPhase::CheckingForUpgrade,
                TaskPhase::VerifyingLiveness,
            ) {
                let package = package.clone();
                launched.extend(self.launch(guard, move |ctx, _| run_check(ctx, &package)));
            }
        }

        self.tick += 1;
        launched
    }

    /// Ticks every `period` until `stop` fires or its sender goes away.
    pub fn run(mut self, period: Duration, stop: Receiver<()>) {
        info!(
            services = self.services.len(),
            packages = self.packages.len(),
            "scheduler running"
        );
        let mut next_tick = Instant::now() + period;
        loop {
            let wait = next_tick.saturating_duration_since(Instant::now());
            match stop.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {
                    self.run_tick();
                    next_tick += period;
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(ticks = self.tick, "scheduler stopped");
    }

    pub fn spawn(self, period: Duration) -> std::io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("stagehand-scheduler".to_string())
            .spawn(move || self.run(period, stop_rx))?;
        Ok(SchedulerHandle { stop_tx, thread })
    }

    fn launch<F>(&self, guard: TaskGuard, action: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(&UpgradeContext, &str) + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        let thread_name = format!("{}:{}", guard.phase(), guard.name());
        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            action(&ctx, guard.name());
            drop(guard);
        });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("failed to spawn worker thread: {err}");
                None
            }
        }
    }
}

pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops future ticks and waits for the tick thread. Launched actions keep running.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            error!("scheduler thread panicked");
        }
    }
}

fn run_liveness(ctx: &UpgradeContext, name: &str) {
    match ensure_service_running(ctx, name) {
        Ok(LivenessOutcome::StatusUnknown) => debug!(service = name, "service status unknown"),
        Ok(_) => {}
        Err(err) => error!(service = name, "{err:#}"),
    }
}

fn run_check(ctx: &UpgradeContext, package: &PackageTarget) {
    match check_for_upgrade(ctx, package) {
        Ok(CheckOutcome::AlreadyStaged { version }) => {
            debug!(package = %package.name, version = %version, "staged upgrade awaits approval")
        }
        Ok(_) => {}
        Err(err) => error!(package = %package.name, "{err:#}"),
    }
}

fn run_apply(ctx: &UpgradeContext, name: &str) {
    match apply_staged_upgrade(ctx, name) {
        Ok(ApplyOutcome::NothingStaged) => debug!(package = name, "nothing staged to apply"),
        Ok(_) => {}
        Err(err) => error!(package = name, "{err:#}"),
    }
}
