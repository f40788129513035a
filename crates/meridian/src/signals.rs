//! Signal handling for graceful server shutdown.
//!
//! Cross-platform signal handling so the node can settle in-flight work
//! before final cleanup.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal.
///
/// * **Unix platforms**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C
///
/// Returns once a signal is received; the caller then drives the actual
/// shutdown through the world context.
pub async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}
