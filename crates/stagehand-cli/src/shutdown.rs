use anyhow::{Context, Result};
use stagehand_daemon::SchedulerHandle;
use tracing::info;

/// Blocks until SIGINT or SIGTERM (Ctrl-C on Windows) arrives.
pub(crate) fn wait_for_stop_signal() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime.block_on(stop_signal())
}

#[cfg(unix)]
async fn stop_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn stop_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}

/// Runs the scheduler until `wait` returns, then stops ticking. Actions already in
/// flight finish on their own threads.
pub(crate) fn run_until_stopped<W>(handle: SchedulerHandle, wait: W) -> Result<()>
where
    W: FnOnce() -> Result<()>,
{
    let waited = wait();
    info!("stop requested, shutting down scheduler");
    handle.stop();
    info!("daemon stopped");
    waited
}
