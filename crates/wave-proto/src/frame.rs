//! The gateway frame envelope.
//!
//! Every websocket text message is one JSON object of the shape
//! `{"op": int, "d": payload, "s": int|null, "t": string|null}`. The codec
//! only interprets those four fields; payload contents are left to callers.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;
use crate::intents::Intents;
use crate::opcode::OpCode;

/// One decoded unit of the gateway wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Operation code.
    pub op: OpCode,
    /// Payload.
    #[serde(rename = "d", default)]
    pub data: Value,
    /// Sequence number, present on dispatch frames.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Event name, present on dispatch frames.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl Frame {
    /// Create a frame with no sequence or event name.
    #[must_use]
    pub const fn new(op: OpCode, data: Value) -> Self {
        Self {
            op,
            data,
            sequence: None,
            event: None,
        }
    }

    /// Heartbeat frame carrying the last sequence number seen, or `null`.
    #[must_use]
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, sequence.map_or(Value::Null, Value::from))
    }

    /// IDENTIFY frame.
    #[must_use]
    pub fn identify(identify: &Identify) -> Self {
        let data = serde_json::json!({
            "token": identify.token,
            "intents": identify.intents.bits(),
            "properties": identify.properties,
        });
        Self::new(OpCode::Identify, data)
    }

    /// HELLO frame as sent by a server.
    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::new(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms }),
        )
    }

    /// Dispatch frame as sent by a server.
    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            data,
            sequence: Some(sequence),
            event: Some(event.into()),
        }
    }

    /// Whether this frame carries an application event.
    #[must_use]
    pub fn is_dispatch(&self) -> bool {
        self.op == OpCode::Dispatch
    }

    /// Deserialize the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidPayload`] if the payload does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self, kind: &'static str) -> Result<T, ProtoError> {
        T::deserialize(&self.data).map_err(|e| ProtoError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    /// Decode a frame from wire text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MalformedFrame`] if the text is not a frame envelope.
    pub fn decode(text: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(text).map_err(|e| ProtoError::MalformedFrame(e.to_string()))
    }

    /// Encode the frame to wire text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }
}

/// Payload of the HELLO frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

/// Client-identification metadata sent with IDENTIFY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system.
    #[serde(rename = "$os")]
    pub os: String,
    /// Library name.
    #[serde(rename = "$browser")]
    pub browser: String,
    /// Device name.
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "wavebot".to_string(),
            device: "wavebot".to_string(),
        }
    }
}

/// Fields of the IDENTIFY payload.
#[derive(Clone)]
pub struct Identify {
    /// Bot token.
    pub token: String,
    /// Requested intents.
    pub intents: Intents,
    /// Connection properties.
    pub properties: ConnectionProperties,
}

impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .finish()
    }
}
