//! Application events delivered to registered handlers.

use serde_json::Value;
use wave_proto::{Message, Ready};

/// Canonical name of the event sent once the session is identified.
pub const READY: &str = "ready";

/// Canonical name of the event sent for every new message.
pub const MESSAGE_CREATE: &str = "message_create";

/// Lower-case an event name the way registrations and dispatch compare them.
#[must_use]
pub fn canonical_event_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An event handed to handlers registered for its name.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The session is identified.
    Ready(Ready),
    /// A message was posted.
    MessageCreate(Message),
    /// Any other dispatch, with its raw payload.
    Dispatch {
        /// Canonical (lower-case) event name.
        name: String,
        /// Raw payload.
        data: Value,
    },
}

impl Event {
    /// Canonical name of the event.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(_) => READY,
            Self::MessageCreate(_) => MESSAGE_CREATE,
            Self::Dispatch { name, .. } => name,
        }
    }

    /// The message, for `message_create` events.
    #[must_use]
    pub const fn as_message(&self) -> Option<&Message> {
        match self {
            Self::MessageCreate(message) => Some(message),
            _ => None,
        }
    }
}
