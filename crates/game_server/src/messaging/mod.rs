//! Command intake for game sessions.
//!
//! This module defines the shape of commands handed over by the transport
//! layer and the table that maps each command kind onto a game state
//! operation.

pub mod router;
pub mod types;

pub use router::route_command;
pub use types::InboundCommand;
