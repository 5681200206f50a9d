//! Signal handling for graceful server shutdown.
//!
//! A first SIGINT/SIGTERM (Ctrl+C on Windows) flips the shared shutdown
//! state so the session manager stops admitting work and drains; a second
//! one is handled by the application as a forced exit.

use game_server::ShutdownState;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal, then initiates shutdown on `shutdown_state`.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
pub async fn setup_signal_handlers(shutdown_state: &ShutdownState) -> Result<(), Box<dyn std::error::Error>> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    shutdown_state.initiate_shutdown();
    Ok(())
}

/// Resolves on the next termination signal without touching any state.
pub async fn wait_for_signal() -> Result<(), Box<dyn std::error::Error>> {
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

    Ok(())
}
