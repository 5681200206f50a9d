//! # Game Server - Session Concurrency Layer
//!
//! Hosts many independent Strife and Strike sessions at once. The server
//! owns no game rules itself; it decides which sessions exist, feeds each
//! one its commands in order and tears sessions down when they are done or
//! have been around too long.
//!
//! ## Architecture Overview
//!
//! * **[`GameManager`]** - registry of live sessions, bounded by a pool of
//!   admission permits
//! * **[`GameSession`]** - one game state behind an async lock, fed by a
//!   bounded FIFO queue and a dedicated worker task
//! * **[`route_command`]** - maps each queued command onto a game state
//!   operation
//! * **[`ShutdownState`]** - shared flags that stop intake before teardown
//!
//! ### Command Flow
//!
//! 1. The transport parses an [`InboundCommand`] and hands it to the manager
//! 2. The manager looks up the session and enqueues the command without
//!    blocking; a full queue or missing session is reported immediately
//! 3. The session worker dequeues commands one at a time, takes the state
//!    lock and runs the command to completion
//! 4. The submitter learns the outcome through a [`CommandReceipt`]
//!
//! ```rust
//! use game_server::{create_manager, InboundCommand};
//! use strife_event_system::{json, SessionId};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let manager = create_manager();
//!     manager.create_session(SessionId::from("table-1")).await.unwrap();
//!
//!     let command: InboundCommand = serde_json::from_value(json!({
//!         "session_id": "table-1",
//!         "kind": "PLAYER_JOIN",
//!         "payload": { "player": "alice" }
//!     }))
//!     .unwrap();
//!     let receipt = manager.submit_command(command).unwrap();
//!     assert_eq!(receipt.outcome().await, Ok(()));
//!
//!     manager.shutdown_all().await;
//! }
//! ```
//!
//! ## Error Handling
//!
//! The server uses structured error types ([`ServerError`]) to categorize failures:
//!
//! * **Capacity errors** - refused at creation, nothing else is affected
//! * **Queue errors** - reported to the submitter with the event marked failed
//! * **Session faults** - contained to the one command that raised them; the
//!   lock is released and the session keeps processing
//!
//! ## Thread Safety
//!
//! All manager operations take `&self` and may be called from any task. A
//! session's state is only ever touched under its own lock, so sessions never
//! contend with one another.

pub mod config;
pub mod error;
pub mod manager;
pub mod messaging;
pub mod session;
pub mod shutdown;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::ServerConfig;
pub use error::{ServerError, SubmitRejected};
pub use manager::{GameManager, ManagerStats};
pub use messaging::{route_command, InboundCommand};
pub use session::{CommandReceipt, CommandResult, GameSession, SessionStats};
pub use shutdown::ShutdownState;
pub use utils::{create_manager, create_manager_with_config};
