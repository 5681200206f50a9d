//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that builds the session
//! manager from configuration, keeps it running until a termination signal
//! arrives and then drains every live session.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, wait_for_signal},
};
use game_server::{GameManager, ShutdownState};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from files and CLI
/// * **Session Hosting**: Owns the session manager and its idle sweep
/// * **Health Monitoring**: Periodic session statistics
/// * **Graceful Shutdown**: Handles termination signals and drains sessions
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Session manager shared with the transport layer
    manager: Arc<GameManager>,
    /// Shutdown flags shared with the manager
    shutdown_state: ShutdownState,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the session manager
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli_overrides(&args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let shutdown_state = ShutdownState::new();
        let manager = Arc::new(GameManager::new(config.to_server_config()).with_shutdown_state(shutdown_state.clone()));

        Ok(Self {
            config,
            manager,
            shutdown_state,
        })
    }

    /// Session manager handle for the transport collaborator.
    pub fn manager(&self) -> Arc<GameManager> {
        Arc::clone(&self.manager)
    }

    /// Runs until a termination signal arrives, then drains every session.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Strife session host");
        self.log_configuration_summary();

        let sweep_handle = self.manager.start_idle_sweep();

        let monitoring_handle = {
            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
                let mut last_created = 0u64;

                loop {
                    interval.tick().await;

                    let stats = manager.stats();
                    let created_this_period = stats.sessions_created - last_created;
                    last_created = stats.sessions_created;

                    info!(
                        "📊 Session Health - {} live | {} free slots | {} created/min | {} reclaimed total",
                        stats.live_sessions, stats.available_slots, created_this_period, stats.sessions_reclaimed
                    );

                    if stats.available_slots == 0 {
                        warn!("🔥 Session capacity exhausted - new sessions are being refused");
                    }
                }
            })
        };

        info!("✅ Strife is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers(&self.shutdown_state).await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("📡 Phase 1: Stopping monitoring and idle sweep...");
        monitoring_handle.abort();
        if let Some(sweep_handle) = sweep_handle {
            sweep_handle.abort();
        }

        info!("⏳ Phase 2: Ending live sessions...");
        let live = self.manager.session_count();
        if tokio::time::timeout(tokio::time::Duration::from_secs(10), self.manager.shutdown_all())
            .await
            .is_err()
        {
            warn!("⏰ Timeout reached, proceeding with shutdown (some sessions may not have drained)");
        } else {
            info!("✅ {} sessions drained", live);
        }

        log_final_statistics(&self.manager);
        info!("✅ Strife shutdown complete");

        Ok(())
    }

    fn log_configuration_summary(&self) {
        let sessions = &self.config.sessions;
        info!("📋 Configuration Summary:");
        info!("  👥 Max sessions: {}", sessions.max_sessions);
        info!("  📥 Queue capacity: {}", sessions.queue_capacity);
        info!(
            "  ⏱️ Idle timeout: {}s (sweep every {}s)",
            sessions.idle_timeout_secs, sessions.sweep_interval_secs
        );
        info!(
            "  🎲 Dice bound: {} | Hand limit: {} | Min players: {}",
            self.config.rules.base_dice_bound, self.config.rules.hand_limit, self.config.rules.min_players
        );
    }
}

fn log_final_statistics(manager: &GameManager) {
    let stats = manager.stats();
    info!("📊 Final Statistics:");
    info!("  - Sessions created: {}", stats.sessions_created);
    info!("  - Sessions ended: {}", stats.sessions_ended);
    info!("  - Sessions reclaimed while idle: {}", stats.sessions_reclaimed);
}
