//! Termination signal handling for [`Orchestrator::run_until_signal`](crate::Orchestrator::run_until_signal).
//!
//! Unix: `SIGINT`, `SIGTERM` (systemd, container runtimes) and `SIGQUIT`.
//! Elsewhere: Ctrl-C only.

/// Completes when the process receives a termination signal.
///
/// Errors only if a signal handler cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::debug!(signal = name, "shutdown signal");
    Ok(())
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
