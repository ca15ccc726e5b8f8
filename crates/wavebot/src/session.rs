//! Per-connection session state.
//!
//! The dispatch loop writes the sequence number while the heartbeat task
//! reads it. Every `u64` is a valid sequence, so absence is tracked as an
//! `Option` behind a short-held lock. Session id and user are written once
//! per handshake and read by handlers.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use wave_proto::User;

/// Holder for the last-seen sequence number.
#[derive(Debug, Default)]
pub struct SequenceCounter(Mutex<Option<u64>>);

impl SequenceCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    /// Load the last sequence number, if any.
    #[must_use]
    pub fn load(&self) -> Option<u64> {
        *self.0.lock()
    }

    /// Record a sequence number. Last write wins.
    pub fn store(&self, sequence: u64) {
        *self.0.lock() = Some(sequence);
    }
}

#[derive(Debug, Default)]
struct Identity {
    session_id: Option<String>,
    user: Option<User>,
    heartbeat_interval: Option<Duration>,
}

/// State of one gateway connection.
#[derive(Debug, Default)]
pub struct Session {
    sequence: SequenceCounter,
    identity: RwLock<Identity>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last sequence number observed on this connection.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence.load()
    }

    /// Record a sequence number from an inbound frame.
    pub fn record_sequence(&self, sequence: u64) {
        self.sequence.store(sequence);
    }

    /// Session identifier from READY.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.identity.read().session_id.clone()
    }

    /// The authenticated bot user from READY.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.identity.read().user.clone()
    }

    /// Heartbeat interval announced in HELLO.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.identity.read().heartbeat_interval
    }

    pub(crate) fn set_heartbeat_interval(&self, interval: Duration) {
        self.identity.write().heartbeat_interval = Some(interval);
    }

    pub(crate) fn set_ready(&self, session_id: String, user: User) {
        let mut identity = self.identity.write();
        identity.session_id = Some(session_id);
        identity.user = Some(user);
    }
}
