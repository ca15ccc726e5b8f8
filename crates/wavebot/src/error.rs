//! Error types for wavebot.

use std::time::Duration;

use thiserror::Error;
use wave_proto::OpCode;

/// Error returned by event and command handlers.
///
/// Handler errors never leave the handler's task: they are logged and dropped.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for event and command handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Websocket connection could not be opened.
    #[error("gateway connection failed: {0}")]
    Connection(String),

    /// The first gateway frame was not HELLO.
    #[error("unexpected {got} frame, expected {expected}")]
    UnexpectedFrame {
        /// The operation code that was required.
        expected: OpCode,
        /// The operation code that arrived instead.
        got: OpCode,
    },

    /// No HELLO arrived within the configured bound.
    #[error("no HELLO received within {0:?}")]
    HandshakeTimeout(Duration),

    /// The websocket closed or failed; the session is over.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// A REST call failed below the HTTP layer.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A REST call returned a non-success status.
    #[error("api error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] wave_proto::ProtoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_frame_display() {
        let err = GatewayError::UnexpectedFrame {
            expected: OpCode::Hello,
            got: OpCode::Dispatch,
        };
        assert_eq!(
            err.to_string(),
            "unexpected Dispatch(0) frame, expected Hello(10)"
        );
    }

    #[test]
    fn test_handshake_timeout_display() {
        let err = GatewayError::HandshakeTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "no HELLO received within 30s");
    }

    #[test]
    fn test_transport_closed_display() {
        let err = GatewayError::TransportClosed("connection reset".to_string());
        assert_eq!(err.to_string(), "transport closed: connection reset");
    }

    #[test]
    fn test_api_error_display() {
        let err = GatewayError::Api {
            status: 401,
            body: "401: Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "api error 401: 401: Unauthorized");
    }

    #[test]
    fn test_protocol_error_conversion() {
        let proto = wave_proto::ProtoError::MalformedFrame("eof".to_string());
        let err: GatewayError = proto.into();
        assert_eq!(err.to_string(), "protocol error: malformed frame: eof");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GatewayError = io_err.into();
        assert!(err.to_string().contains("io error"));
    }
}
