//! Listener registry and dispatch.

mod core;
mod emitters;
mod handlers;
mod stats;

pub use core::EventDispatcher;
pub use stats::DispatcherStats;
