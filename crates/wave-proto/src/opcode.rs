//! Gateway operation codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation code carried in the `op` field of every frame.
///
/// Codes this client does not know about are kept as [`OpCode::Unknown`] so
/// that they still round-trip through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OpCode {
    /// An application event (`t` names it).
    Dispatch,
    /// Keepalive, sent by the client on the heartbeat interval.
    Heartbeat,
    /// Session start, sent by the client after HELLO.
    Identify,
    /// Presence update.
    PresenceUpdate,
    /// Voice state update.
    VoiceStateUpdate,
    /// Resume a dropped session.
    Resume,
    /// Server asks the client to reconnect.
    Reconnect,
    /// Request guild members.
    RequestGuildMembers,
    /// Server reports the session as invalid.
    InvalidSession,
    /// First frame of every connection, carries the heartbeat interval.
    Hello,
    /// Server acknowledgement of a heartbeat.
    HeartbeatAck,
    /// Any code not listed above.
    Unknown(u8),
}

impl OpCode {
    /// Numeric wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Dispatch => 0,
            Self::Heartbeat => 1,
            Self::Identify => 2,
            Self::PresenceUpdate => 3,
            Self::VoiceStateUpdate => 4,
            Self::Resume => 6,
            Self::Reconnect => 7,
            Self::RequestGuildMembers => 8,
            Self::InvalidSession => 9,
            Self::Hello => 10,
            Self::HeartbeatAck => 11,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u8> for OpCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => Self::Unknown(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op.code()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({code})"),
            other => write!(f, "{other:?}({})", other.code()),
        }
    }
}
