//! HELLO / IDENTIFY handshake.
//!
//! The first frame on a fresh connection must be HELLO. Its interval starts
//! the heartbeat, then one IDENTIFY is queued and the connection counts as
//! established without waiting for READY.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wave_proto::{Frame, Hello, Identify, OpCode, ProtoError};

use crate::error::GatewayError;
use crate::session::Session;

use super::heartbeat::{HeartbeatHandle, start_heartbeat_task};
use super::state::{AtomicConnectionState, ConnectionState};
use super::transport::{Inbound, classify};

/// Drives one connection from `AwaitingHello` to `Established`.
#[derive(Debug, Clone)]
pub struct Handshake {
    identify: Identify,
    hello_timeout: Duration,
}

impl Handshake {
    /// Create a handshake that sends `identify` once HELLO arrives.
    #[must_use]
    pub const fn new(identify: Identify, hello_timeout: Duration) -> Self {
        Self {
            identify,
            hello_timeout,
        }
    }

    /// Run the handshake over `read`, queueing outbound frames on `outbound`.
    ///
    /// On success the heartbeat task is running under `cancel` and the
    /// returned handle controls it.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::HandshakeTimeout`] if no HELLO arrives in time
    /// - [`GatewayError::UnexpectedFrame`] if the first frame is not HELLO
    /// - [`GatewayError::TransportClosed`] if the connection ends first
    /// - [`GatewayError::Protocol`] if the first frame cannot be decoded
    pub async fn run<S>(
        &self,
        read: &mut S,
        outbound: &mpsc::Sender<Frame>,
        session: &Arc<Session>,
        state: &AtomicConnectionState,
        cancel: CancellationToken,
    ) -> Result<HeartbeatHandle, GatewayError>
    where
        S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    {
        state.store(ConnectionState::AwaitingHello);

        let hello = tokio::time::timeout(self.hello_timeout, wait_for_hello(read, session))
            .await
            .map_err(|_| GatewayError::HandshakeTimeout(self.hello_timeout))??;

        state.store(ConnectionState::Identifying);
        let interval = Duration::from_millis(hello.heartbeat_interval);
        session.set_heartbeat_interval(interval);
        debug!(interval_ms = hello.heartbeat_interval, "received HELLO");

        let heartbeat = start_heartbeat_task(interval, Arc::clone(session), outbound.clone(), cancel);

        if outbound.send(Frame::identify(&self.identify)).await.is_err() {
            heartbeat.stop();
            return Err(GatewayError::TransportClosed(
                "writer stopped before IDENTIFY".to_string(),
            ));
        }

        state.store(ConnectionState::Established);
        info!(intents = ?self.identify.intents, "identified with gateway");
        Ok(heartbeat)
    }
}

async fn wait_for_hello<S>(read: &mut S, session: &Session) -> Result<Hello, GatewayError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let text = match classify(read.next().await) {
            Inbound::Text(text) => text,
            Inbound::Skip => continue,
            Inbound::Closed(reason) => return Err(GatewayError::TransportClosed(reason)),
        };

        let frame = Frame::decode(&text)?;
        if let Some(sequence) = frame.sequence {
            session.record_sequence(sequence);
        }
        if frame.op != OpCode::Hello {
            return Err(GatewayError::UnexpectedFrame {
                expected: OpCode::Hello,
                got: frame.op,
            });
        }

        let hello: Hello = frame.payload("hello")?;
        if hello.heartbeat_interval == 0 {
            return Err(ProtoError::InvalidPayload {
                kind: "hello",
                reason: "heartbeat_interval must be positive".to_string(),
            }
            .into());
        }
        return Ok(hello);
    }
}
