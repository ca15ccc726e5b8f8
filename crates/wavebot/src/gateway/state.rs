//! Connection lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Where a gateway connection is in its lifecycle.
///
/// A connection moves forward only:
/// `Disconnected → Connecting → AwaitingHello → Identifying → Established → Closed`.
/// Any failure before `Established` jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempted yet.
    Disconnected,
    /// Opening the websocket.
    Connecting,
    /// Socket open, waiting for HELLO.
    AwaitingHello,
    /// HELLO received, sending IDENTIFY.
    Identifying,
    /// IDENTIFY sent; frames flow to the dispatcher.
    Established,
    /// The session has ended.
    Closed,
}

impl ConnectionState {
    /// Whether frames are being dispatched to handlers.
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Established)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Established => "established",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic wrapper for connection state.
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::AwaitingHello,
            3 => ConnectionState::Identifying,
            4 => ConnectionState::Established,
            _ => ConnectionState::Closed,
        }
    }

    /// Store a new state.
    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}
