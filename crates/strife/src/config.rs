//! Configuration management for the Strife server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use crate::cli::CliArgs;
use game_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strife_game::GameRules;
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// ```toml
/// [sessions]
/// max_sessions = 100
/// idle_timeout_secs = 3600
/// sweep_interval_secs = 300
/// queue_capacity = 256
///
/// [rules]
/// hand_limit = 5
/// base_dice_bound = 4
///
/// [logging]
/// level = "info"
/// json_format = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session manager settings
    pub sessions: SessionSettings,
    /// Game rules handed to every session
    pub rules: GameRules,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Session capacity, queueing and reclamation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of concurrently live sessions
    pub max_sessions: usize,
    /// Sessions older than this are reclaimed, in seconds
    pub idle_timeout_secs: u64,
    /// Interval between idle sweeps in seconds (0 to disable)
    pub sweep_interval_secs: u64,
    /// Inbound command queue capacity per session
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            max_sessions: defaults.max_sessions,
            idle_timeout_secs: defaults.idle_timeout_secs,
            sweep_interval_secs: defaults.sweep_interval_secs,
            queue_capacity: defaults.queue_capacity,
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(max_sessions) = args.max_sessions {
            self.sessions.max_sessions = max_sessions;
        }
        if let Some(idle_timeout_secs) = args.idle_timeout_secs {
            self.sessions.idle_timeout_secs = idle_timeout_secs;
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Converts the application configuration to a session manager configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            max_sessions: self.sessions.max_sessions,
            idle_timeout_secs: self.sessions.idle_timeout_secs,
            sweep_interval_secs: self.sessions.sweep_interval_secs,
            queue_capacity: self.sessions.queue_capacity,
            rules: self.rules.clone(),
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.sessions.sweep_interval_secs == 0 {
            return Err("sessions.sweep_interval_secs must be greater than 0".to_string());
        }

        self.to_server_config().validate()
    }
}
