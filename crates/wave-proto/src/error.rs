//! Error types for the wave-proto crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Inbound text could not be parsed as a frame envelope.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame payload did not have the expected shape.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// What the payload was expected to be.
        kind: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An intent name was not recognised.
    #[error("unknown intent: {0}")]
    UnknownIntent(String),
}
