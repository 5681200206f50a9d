//! # Strife Event System
//!
//! Priority-ordered, cancelable event dispatch used by every game session.
//!
//! ## Core Features
//!
//! - **Closed event kinds**: [`EventKind`] is the fixed set of dispatch keys
//! - **Mutable in-flight events**: listeners rewrite [`GameEvent`] payloads in place
//! - **Cancelation**: any listener can abort the action a pre-event describes
//! - **Fault isolation**: a listener that errors or panics is rolled back and
//!   skipped; its siblings still run
//! - **Context-generic**: [`EventDispatcher<C>`] hands every listener `&mut C`,
//!   the state the dispatch is about
//!
//! ## Quick Start Example
//!
//! ```rust
//! use strife_event_system::*;
//!
//! #[derive(Default)]
//! struct Arena {
//!     blocked: u32,
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let dispatcher = EventDispatcher::<Arena>::new();
//!
//!     // A shield that blocks every attack aimed at "bob"
//!     dispatcher.on(EventKind::PreAttack, 100, "shield", |event, arena: &mut Arena| {
//!         if event.get_str("defender") == Some("bob") {
//!             arena.blocked += 1;
//!             event.cancel();
//!         }
//!         Ok(None)
//!     });
//!
//!     let mut arena = Arena::default();
//!     let event = dispatcher
//!         .dispatch(
//!             EventKind::PreAttack,
//!             to_payload(json!({ "attacker": "alice", "defender": "bob", "canceled": false })),
//!             &mut arena,
//!         )
//!         .await;
//!
//!     assert!(event.is_canceled());
//!     assert_eq!(arena.blocked, 1);
//! }
//! ```

// Core modules
pub mod events;
pub mod system;
pub mod types;
pub mod utils;

// Re-export commonly used items for convenience
pub use events::{EventError, EventHandler, EventKind, FnHandler, GameEvent, Payload, CANCELED_KEY};
pub use system::{DispatcherStats, EventDispatcher};
pub use types::*;
pub use utils::{create_event_dispatcher, current_timestamp, panic_message, to_payload};

// External dependencies that trait implementors commonly need
pub use async_trait::async_trait;
pub use serde_json::{json, Value};
