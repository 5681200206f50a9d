//! # Utility Functions
//!
//! Small helpers shared by the dispatcher and its callers.
//!
//! ## Key Functions
//!
//! - [`current_timestamp()`] - Consistent timestamp generation
//! - [`to_payload()`] - Turns a `json!` literal into an event payload
//! - [`create_event_dispatcher()`] - Dispatcher factory function
//! - [`panic_message()`] - Readable text from a caught panic payload

use crate::events::Payload;
use crate::system::EventDispatcher;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Returns the current Unix timestamp in seconds.
///
/// A clock set before the Unix epoch yields `0` rather than failing event
/// construction.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Converts a JSON value into a payload map.
///
/// Objects are taken as-is; any other value produces an empty payload.
///
/// ```rust
/// use strife_event_system::to_payload;
/// use serde_json::json;
///
/// let payload = to_payload(json!({ "damage": 12 }));
/// assert_eq!(payload["damage"], 12);
/// assert!(to_payload(json!(7)).is_empty());
/// ```
pub fn to_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Creates a new, empty dispatcher for the given context type, ready to be
/// shared between the state that owns it and the traits registered on it.
pub fn create_event_dispatcher<C: Send + 'static>() -> Arc<EventDispatcher<C>> {
    Arc::new(EventDispatcher::new())
}

/// Extracts the message from a payload caught by `catch_unwind`.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
