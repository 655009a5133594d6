//! Signal stage -- the operator command that stops the daemon.
//!
//! Waits for a trigger (SIGINT/SIGTERM in production, any future in tests)
//! and fires the shutdown broadcast. It also exits quietly when shutdown is
//! fired by someone else, so it never holds up the final join.

use std::future::Future;

use anyhow::Result;

use netwatch_core::SyncCoordinator;

/// Wait for `trigger` or an external shutdown, whichever comes first.
///
/// Returns `true` if this stage fired the broadcast.
pub async fn run<F>(sync: SyncCoordinator, trigger: F) -> bool
where
    F: Future<Output = ()> + Send,
{
    tokio::select! {
        _ = trigger => {
            sync.broadcast_shutdown()
        }
        _ = sync.wait_shutdown() => {
            tracing::debug!("signal stage observed external shutdown");
            false
        }
    }
}

/// Wait for SIGINT or SIGTERM and log which one arrived.
///
/// If the handlers cannot be installed the error is logged and the future
/// completes immediately, which shuts the daemon down instead of leaving it
/// without a way to stop.
pub async fn os_signal() {
    match wait_for_shutdown_signal().await {
        Ok(signal) => tracing::info!(signal, "shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to install signal handlers, shutting down"),
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {}", e))?;
    Ok("Ctrl-C")
}
