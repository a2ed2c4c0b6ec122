//! # Termination signals for long-running orchestrators.
//!
//! [`wait_for_termination`] completes when the process is asked to stop, so a
//! test harness can run `Orchestrator::run_until_signal` and collect the trace
//! on Ctrl-C.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGHUP`. **Elsewhere:** Ctrl-C.

/// Waits for a termination signal.
///
/// Fails only if a signal handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {},
        _ = hup.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
