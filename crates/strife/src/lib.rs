//! # Strife Server - Main Entry Point
//!
//! Hosts concurrent Strife and Strike sessions. This entry point handles CLI
//! parsing, configuration loading, logging and the application lifecycle;
//! transports hand commands to the session manager exposed by
//! [`Application::manager`].
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! strife
//!
//! # Specify custom configuration
//! strife --config production.toml
//!
//! # Override specific settings
//! strife --max-sessions 500 --idle-timeout 1800 --log-level debug
//!
//! # JSON logging for production
//! strife --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The server handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)
//!
//! A second signal during shutdown exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

pub use app::Application;
pub use cli::CliArgs;
pub use config::{AppConfig, LoggingSettings, SessionSettings};

/// Runs the server until shutdown.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file, so read it before anything logs.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    config.apply_cli_overrides(&args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_application_creation_applies_overrides() {
        let dir = tempdir().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("strife.toml"),
            max_sessions: Some(3),
            log_level: Some("debug".to_string()),
            ..CliArgs::default()
        };

        let app = Application::new(args.clone()).await.unwrap();

        assert!(args.config_path.exists());
        let manager = app.manager();
        assert_eq!(manager.config().max_sessions, 3);
        assert_eq!(manager.available_slots(), 3);
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_overrides() {
        let dir = tempdir().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("strife.toml"),
            max_sessions: Some(0),
            ..CliArgs::default()
        };

        assert!(Application::new(args).await.is_err());
    }

    #[tokio::test]
    async fn test_manager_drains_on_shutdown() {
        let dir = tempdir().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("strife.toml"),
            ..CliArgs::default()
        };
        let app = Application::new(args).await.unwrap();
        let manager = app.manager();

        manager.shutdown_all().await;

        assert!(manager.shutdown_state().is_shutdown_complete());
    }
}
