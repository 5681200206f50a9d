//! Server configuration types and defaults.
//!
//! This module contains the session manager configuration and the default
//! values used when no configuration file overrides them.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strife_game::GameRules;

/// Configuration structure for the session manager.
///
/// Resolved before any session starts and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum number of concurrently live sessions (admission tokens)
    pub max_sessions: usize,

    /// Sessions older than this are reclaimed by the idle sweep, in seconds
    pub idle_timeout_secs: u64,

    /// Interval between idle sweeps in seconds (0 to disable)
    pub sweep_interval_secs: u64,

    /// Inbound command queue capacity per session
    pub queue_capacity: usize,

    /// Rules handed to every new session's game state
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            idle_timeout_secs: 3600, // 1 hour
            sweep_interval_secs: 300, // 5 minutes
            queue_capacity: 256,
            rules: GameRules::default(),
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_sessions == 0 {
            return Err("max_sessions must be greater than 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }
        if self.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be greater than 0".to_string());
        }
        self.rules.validate()
    }
}
