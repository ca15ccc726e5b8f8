//! Gateway client: the composition root.
//!
//! Owns one websocket connection and runs it through handshake, heartbeat
//! and dispatch until it closes or shutdown is requested. There is exactly
//! one connection attempt per [`GatewayClient::run`]; reconnecting is the
//! caller's decision.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wave_proto::{Frame, Identify, Message};

use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::{GatewayError, HandlerResult};
use crate::handlers::{Command, Registry, command_handler, event_handler};
use crate::rest::RestClient;
use crate::session::Session;

use super::dispatch::{Dispatcher, SessionEnd};
use super::events::Event;
use super::handshake::Handshake;
use super::state::{AtomicConnectionState, ConnectionState};

const OUTBOUND_CAPACITY: usize = 32;
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle for stopping a client and watching its state from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    state: Arc<AtomicConnectionState>,
}

impl ShutdownHandle {
    /// Ask the client to close the connection and return from `run`.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }
}

/// Gateway client for WebSocket communication.
pub struct GatewayClient {
    config: ClientConfig,
    registry: Registry,
    state: Arc<AtomicConnectionState>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a client with no handlers registered.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            state: Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a handler for `event` (case-insensitive, e.g. `"MESSAGE_CREATE"`).
    ///
    /// Handlers for the same event run in registration order.
    #[must_use]
    pub fn with_event_handler<F, Fut>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry
            .add_event_handler(event, event_handler(handler));
        self
    }

    /// Register a prefix command. A later registration under the same name
    /// replaces this one.
    #[must_use]
    pub fn with_command<F, Fut>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Context, Message, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let command = Command::new(name, description, command_handler(handler));
        if let Some(previous) = self.registry.add_command(command) {
            debug!(command = %previous.name, "replacing registered command");
        }
        self
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Registered handlers and commands.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// A handle that can stop [`run`](Self::run) from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Connect, identify and dispatch events until the session ends.
    ///
    /// Returns `Ok(())` after a requested shutdown. In-flight handlers are
    /// given `drain_timeout` to finish before they are aborted.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Config`] if the configuration is invalid
    /// - [`GatewayError::Connection`] if the websocket cannot be opened
    /// - [`GatewayError::UnexpectedFrame`], [`GatewayError::HandshakeTimeout`]
    ///   or [`GatewayError::Protocol`] if the handshake fails
    /// - [`GatewayError::TransportClosed`] when the server ends the connection
    pub async fn run(self) -> Result<(), GatewayError> {
        let result = self.run_session().await;
        self.state.store(ConnectionState::Closed);
        if let Err(e) = &result {
            warn!(error = %e, "gateway session ended with error");
        }
        result
    }

    async fn run_session(&self) -> Result<(), GatewayError> {
        self.config.validate()?;
        let token = self.config.require_token()?.to_string();
        let http = Arc::new(RestClient::from_config(&self.config)?);

        let url = match &self.config.gateway_url {
            Some(url) => url.clone(),
            None => http.gateway_url().await?,
        };

        self.state.store(ConnectionState::Connecting);
        info!(gateway = %url, "connecting to gateway");

        let ws = tokio::select! {
            () = self.shutdown.cancelled() => return Ok(()),
            result = tokio_tungstenite::connect_async(url.as_str()) => {
                let (ws, _) = result.map_err(|e| {
                    GatewayError::Connection(format!("failed to connect to {url}: {e}"))
                })?;
                ws
            }
        };
        let (write, mut read) = ws.split();

        let (tx, rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
        let connection = self.shutdown.child_token();
        let writer = tokio::spawn(writer_task(write, rx, connection.clone()));

        let session = Arc::new(Session::new());
        let handshake = Handshake::new(
            Identify {
                token,
                intents: self.config.intents,
                properties: self.config.properties.clone(),
            },
            self.config.hello_timeout(),
        );

        let handshake_result = tokio::select! {
            () = self.shutdown.cancelled() => None,
            result = handshake.run(&mut read, &tx, &session, &self.state, connection.clone()) => Some(result),
        };
        let heartbeat = match handshake_result {
            Some(Ok(heartbeat)) => heartbeat,
            Some(Err(e)) => {
                close_connection(&connection, writer).await;
                return Err(e);
            }
            None => {
                close_connection(&connection, writer).await;
                return Ok(());
            }
        };

        let mut dispatcher = Dispatcher::new(
            Arc::clone(&session),
            Arc::new(self.registry.clone()),
            http,
            self.config.command_prefix,
        );
        let end = dispatcher.run(&mut read, &self.shutdown).await;

        self.state.store(ConnectionState::Closed);
        close_connection(&connection, writer).await;
        debug!(beats = heartbeat.beats_sent(), "heartbeat stopped");

        let aborted = dispatcher.drain(self.config.drain_timeout()).await;
        info!(
            sequence = ?session.sequence(),
            aborted_handlers = aborted,
            "gateway session ended"
        );

        match end {
            SessionEnd::Shutdown => Ok(()),
            SessionEnd::Closed(reason) => Err(GatewayError::TransportClosed(reason)),
        }
    }
}

/// Cancel the connection token (stopping heartbeat and writer) and wait for
/// the writer to send its close frame.
async fn close_connection(connection: &CancellationToken, writer: JoinHandle<()>) {
    connection.cancel();
    match tokio::time::timeout(WRITER_CLOSE_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "websocket writer task failed"),
        Err(_) => warn!("websocket writer did not finish in time"),
    }
}

async fn writer_task<W>(mut write: W, mut rx: mpsc::Receiver<Frame>, cancel: CancellationToken)
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, op = %frame.op, "failed to encode outbound frame");
                continue;
            }
        };
        if let Err(e) = write.send(WsMessage::text(text)).await {
            debug!(error = %e, "websocket write failed");
            return;
        }
    }

    if let Err(e) = write.close().await {
        debug!(error = %e, "websocket close failed");
    }
}
