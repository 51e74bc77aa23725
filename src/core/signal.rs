//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves once the process is asked to stop.
//! On Unix it listens for `SIGINT`, `SIGTERM` and `SIGQUIT`; elsewhere only
//! for Ctrl-C.

/// Resolves on the first termination signal.
///
/// Listeners are registered per call; registration failure is returned as `Err`.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
