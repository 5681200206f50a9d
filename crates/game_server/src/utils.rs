//! Factory helpers for session managers.

use crate::{config::ServerConfig, manager::GameManager};
use std::sync::Arc;

/// Creates a session manager with default configuration.
///
/// # Example
///
/// ```rust
/// use game_server::create_manager;
///
/// let manager = create_manager();
/// assert_eq!(manager.available_slots(), 100);
/// ```
pub fn create_manager() -> Arc<GameManager> {
    create_manager_with_config(ServerConfig::default())
}

/// Creates a session manager with custom configuration.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
pub fn create_manager_with_config(config: ServerConfig) -> Arc<GameManager> {
    Arc::new(GameManager::new(config))
}
