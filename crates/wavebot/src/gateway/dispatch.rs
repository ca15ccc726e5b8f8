//! Frame dispatch loop.
//!
//! Every frame after the handshake lands here, strictly in arrival order.
//! Sequence numbers are recorded first, then dispatch frames are turned into
//! [`Event`]s and fanned out to handlers as independent tasks. Handlers are
//! not awaited by the loop; they are tracked so the client can drain them
//! when the session ends.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::{JoinError, JoinSet};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use wave_proto::{Frame, Message, OpCode, Ready};

use crate::commands::{CommandRouter, Invocation};
use crate::context::Context;
use crate::handlers::Registry;
use crate::rest::RestClient;
use crate::session::Session;

use super::events::{Event, MESSAGE_CREATE, READY, canonical_event_name};
use super::transport::{Inbound, classify};

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested locally.
    Shutdown,
    /// The connection closed, with the reason reported by the transport.
    Closed(String),
}

/// Routes decoded frames to session state, commands and event handlers.
pub struct Dispatcher {
    session: Arc<Session>,
    registry: Arc<Registry>,
    router: CommandRouter,
    ctx: Context,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    /// Create a dispatcher for one session.
    #[must_use]
    pub fn new(
        session: Arc<Session>,
        registry: Arc<Registry>,
        http: Arc<RestClient>,
        command_prefix: char,
    ) -> Self {
        let ctx = Context::new(
            http,
            Arc::clone(&session),
            Arc::clone(&registry),
            command_prefix,
        );
        Self {
            router: CommandRouter::new(command_prefix, Arc::clone(&registry)),
            session,
            registry,
            ctx,
            tasks: JoinSet::new(),
        }
    }

    /// Number of handler and command tasks not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Read frames until the connection closes or `cancel` fires.
    pub async fn run<S>(&mut self, read: &mut S, cancel: &CancellationToken) -> SessionEnd
    where
        S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    {
        loop {
            let item = tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Shutdown,
                item = read.next() => item,
            };

            match classify(item) {
                Inbound::Text(text) => self.handle_text(&text),
                Inbound::Skip => {}
                Inbound::Closed(reason) => {
                    info!(%reason, "gateway connection closed");
                    return SessionEnd::Closed(reason);
                }
            }
        }
    }

    /// Decode and handle one text frame. Undecodable frames are logged and skipped.
    pub fn handle_text(&mut self, text: &str) {
        match Frame::decode(text) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => warn!(error = %e, "skipping undecodable frame"),
        }
    }

    /// Handle one decoded frame.
    pub fn handle_frame(&mut self, frame: Frame) {
        self.reap();

        if let Some(sequence) = frame.sequence {
            self.session.record_sequence(sequence);
        }

        match frame.op {
            OpCode::Dispatch => self.dispatch(frame),
            OpCode::HeartbeatAck => trace!("heartbeat acknowledged"),
            OpCode::Reconnect | OpCode::InvalidSession => {
                warn!(op = %frame.op, "server asked for a new session, ignoring");
            }
            op => debug!(%op, "ignoring non-dispatch frame"),
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        let Some(raw_name) = frame.event.as_deref() else {
            warn!("dispatch frame without event name");
            return;
        };
        let name = canonical_event_name(raw_name);

        let event = if name == READY {
            self.on_ready(frame.data)
        } else if name == MESSAGE_CREATE {
            self.on_message(frame.data)
        } else {
            Event::Dispatch {
                name,
                data: frame.data,
            }
        };

        self.fan_out(&event);
    }

    fn on_ready(&self, data: serde_json::Value) -> Event {
        match Ready::from_payload(&data) {
            Ok(ready) => {
                self.session
                    .set_ready(ready.session_id.clone(), ready.user.clone());
                info!(
                    user = %ready.user.username,
                    user_id = %ready.user.id,
                    session_id = %ready.session_id,
                    "logged in"
                );
                Event::Ready(ready)
            }
            Err(e) => {
                warn!(error = %e, "invalid READY payload");
                Event::Dispatch {
                    name: READY.to_string(),
                    data,
                }
            }
        }
    }

    fn on_message(&mut self, data: serde_json::Value) -> Event {
        match Message::from_payload(&data) {
            Ok(message) => {
                if let Some(invocation) = self.router.route(&message) {
                    self.spawn_command(invocation);
                }
                Event::MessageCreate(message)
            }
            Err(e) => {
                warn!(error = %e, "invalid MESSAGE_CREATE payload");
                Event::Dispatch {
                    name: MESSAGE_CREATE.to_string(),
                    data,
                }
            }
        }
    }

    fn spawn_command(&mut self, invocation: Invocation) {
        let name = invocation.command.name.clone();
        debug!(command = %name, args = %invocation.args, "running command");

        let fut = invocation.into_future(self.ctx.clone());
        self.tasks.spawn(async move {
            if let Err(e) = fut.await {
                warn!(command = %name, error = %e, "command failed");
            }
        });
    }

    fn fan_out(&mut self, event: &Event) {
        let handlers = self.registry.handlers(event.name());
        if handlers.is_empty() {
            trace!(event = event.name(), "no handlers registered");
            return;
        }

        for handler in handlers {
            let fut = handler(self.ctx.clone(), event.clone());
            let name = event.name().to_string();
            self.tasks.spawn(async move {
                if let Err(e) = fut.await {
                    warn!(event = %name, error = %e, "event handler failed");
                }
            });
        }
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join(result);
        }
    }

    /// Wait for in-flight handlers, aborting whatever is left after `timeout`.
    ///
    /// Returns the number of tasks that had to be aborted.
    pub async fn drain(&mut self, timeout: Duration) -> usize {
        let tasks = &mut self.tasks;
        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                log_join(result);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let remaining = self.tasks.len();
        warn!(remaining, "handlers still running after drain timeout, aborting");
        self.tasks.shutdown().await;
        remaining
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("prefix", &self.router.prefix())
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{Command, command_handler, event_handler};
    use futures::stream;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn dispatcher(registry: Registry) -> (Dispatcher, Arc<Session>) {
        let session = Arc::new(Session::new());
        let http = Arc::new(RestClient::new("test-token", "http://127.0.0.1:9/api", 10));
        (
            Dispatcher::new(Arc::clone(&session), Arc::new(registry), http, '!'),
            session,
        )
    }

    fn message_payload(content: &str) -> serde_json::Value {
        json!({
            "id": "1001",
            "channel_id": "2002",
            "author": {"id": "3003", "username": "alice", "bot": false},
            "content": content
        })
    }

    #[tokio::test]
    async fn test_sequence_is_last_write_wins() {
        let (mut dispatcher, session) = dispatcher(Registry::new());

        dispatcher.handle_frame(Frame::dispatch("GUILD_CREATE", 1, json!({})));
        dispatcher.handle_frame(Frame::dispatch("TYPING_START", 4, json!({})));
        dispatcher.handle_frame(Frame::new(OpCode::HeartbeatAck, serde_json::Value::Null));
        assert_eq!(session.sequence(), Some(4));

        dispatcher.handle_frame(Frame::dispatch("TYPING_START", 2, json!({})));
        assert_eq!(session.sequence(), Some(2));
    }

    #[tokio::test]
    async fn test_ready_records_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = Registry::new();
        registry.add_event_handler(
            "ready",
            event_handler(move |_ctx, event| {
                let tx = tx.clone();
                async move {
                    tx.send(event)?;
                    Ok(())
                }
            }),
        );
        let (mut dispatcher, session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch(
            "READY",
            1,
            json!({"session_id": "abc", "user": {"id": "7", "username": "wavebot", "bot": true}}),
        ));

        assert_eq!(session.session_id().as_deref(), Some("abc"));
        assert_eq!(session.user().map(|u| u.id), Some("7".to_string()));

        let event = rx.recv().await.expect("ready handler");
        assert!(matches!(event, Event::Ready(ref ready) if ready.session_id == "abc"));
    }

    #[tokio::test]
    async fn test_command_and_generic_handler_both_fire() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let mut registry = Registry::new();
        registry.add_command(Command::new(
            "echo",
            "Repeats your message",
            command_handler(move |_ctx, message, args| {
                let tx = cmd_tx.clone();
                async move {
                    tx.send((message.id, args))?;
                    Ok(())
                }
            }),
        ));
        registry.add_event_handler(
            "MESSAGE_CREATE",
            event_handler(move |_ctx, event| {
                let tx = msg_tx.clone();
                async move {
                    tx.send(event.as_message().map(|m| m.content.clone()))?;
                    Ok(())
                }
            }),
        );
        let (mut dispatcher, _session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch(
            "MESSAGE_CREATE",
            2,
            message_payload("!echo hello world"),
        ));
        dispatcher.handle_frame(Frame::dispatch("MESSAGE_CREATE", 3, message_payload("!echo")));
        assert_eq!(dispatcher.drain(Duration::from_secs(1)).await, 0);

        let mut commands = Vec::new();
        while let Ok(call) = cmd_rx.try_recv() {
            commands.push(call);
        }
        commands.sort();
        assert_eq!(
            commands,
            vec![
                ("1001".to_string(), String::new()),
                ("1001".to_string(), "hello world".to_string()),
            ]
        );

        let mut generic = Vec::new();
        while let Ok(content) = msg_rx.try_recv() {
            generic.push(content);
        }
        generic.sort();
        assert_eq!(
            generic,
            vec![Some("!echo".to_string()), Some("!echo hello world".to_string())]
        );
    }

    #[tokio::test]
    async fn test_plain_and_unknown_messages_skip_commands() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<String>();
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let mut registry = Registry::new();
        registry.add_command(Command::new(
            "echo",
            "",
            command_handler(move |_ctx, _message, args| {
                let tx = cmd_tx.clone();
                async move {
                    tx.send(args)?;
                    Ok(())
                }
            }),
        ));
        registry.add_event_handler(
            "message_create",
            event_handler(move |_ctx, _event| {
                let tx = msg_tx.clone();
                async move {
                    tx.send(())?;
                    Ok(())
                }
            }),
        );
        let (mut dispatcher, _session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch("MESSAGE_CREATE", 1, message_payload("hello there")));
        dispatcher.handle_frame(Frame::dispatch("MESSAGE_CREATE", 2, message_payload("!nope")));
        dispatcher.drain(Duration::from_secs(1)).await;

        assert!(cmd_rx.try_recv().is_err());
        assert!(msg_rx.try_recv().is_ok());
        assert!(msg_rx.try_recv().is_ok());
        assert!(msg_rx.try_recv().is_err(), "one generic call per message");
    }

    #[tokio::test]
    async fn test_odd_timestamp_does_not_block_commands() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let mut registry = Registry::new();
        registry.add_command(Command::new(
            "echo",
            "",
            command_handler(move |_ctx, _message, args| {
                let tx = cmd_tx.clone();
                async move {
                    tx.send(args)?;
                    Ok(())
                }
            }),
        ));
        registry.add_event_handler(
            "message_create",
            event_handler(move |_ctx, event| {
                let tx = msg_tx.clone();
                async move {
                    tx.send(event.as_message().is_some())?;
                    Ok(())
                }
            }),
        );
        let (mut dispatcher, _session) = dispatcher(registry);

        let mut payload = message_payload("!echo hi");
        payload["timestamp"] = json!("2024-05-01 12:00");
        dispatcher.handle_frame(Frame::dispatch("MESSAGE_CREATE", 1, payload));
        assert_eq!(dispatcher.drain(Duration::from_secs(1)).await, 0);

        assert_eq!(cmd_rx.try_recv().ok(), Some("hi".to_string()));
        assert_eq!(msg_rx.try_recv().ok(), Some(true));
    }

    #[tokio::test]
    async fn test_max_sequence_reaches_heartbeat() {
        let (mut dispatcher, session) = dispatcher(Registry::new());

        dispatcher.handle_text(
            r#"{"op":0,"s":18446744073709551615,"t":"GUILD_CREATE","d":{}}"#,
        );
        assert_eq!(session.sequence(), Some(u64::MAX));

        let beat = Frame::heartbeat(session.sequence()).encode().unwrap();
        let beat: serde_json::Value = serde_json::from_str(&beat).unwrap();
        assert_eq!(beat["d"], json!(u64::MAX));
    }

    #[tokio::test]
    async fn test_handlers_scheduled_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        for id in 1..=3 {
            let order = Arc::clone(&order);
            registry.add_event_handler(
                "guild_create",
                event_handler(move |_ctx, _event| {
                    order.lock().push(id);
                    async { Ok(()) }
                }),
            );
        }
        let (mut dispatcher, _session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch("GUILD_CREATE", 1, json!({"id": "1"})));

        assert_eq!(*order.lock(), vec![1, 2, 3]);
        assert_eq!(dispatcher.drain(Duration::from_secs(1)).await, 0);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_handlers_are_contained() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = Registry::new();
        registry.add_event_handler(
            "guild_create",
            event_handler(|_ctx, _event| async { Err("boom".into()) }),
        );
        registry.add_event_handler(
            "guild_create",
            event_handler(|_ctx, _event| async {
                let broken = true;
                assert!(!broken, "handler bug");
                Ok(())
            }),
        );
        registry.add_event_handler(
            "guild_create",
            event_handler(move |_ctx, event| {
                let tx = tx.clone();
                async move {
                    tx.send(event.name().to_string())?;
                    Ok(())
                }
            }),
        );
        let (mut dispatcher, session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch("GUILD_CREATE", 1, json!({})));
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.handle_frame(Frame::dispatch("GUILD_CREATE", 2, json!({})));
        dispatcher.drain(Duration::from_secs(1)).await;

        assert_eq!(session.sequence(), Some(2));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("guild_create"));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("guild_create"));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_skipped() {
        let (mut dispatcher, session) = dispatcher(Registry::new());

        dispatcher.handle_text("not json");
        dispatcher.handle_text(r#"{"op":0,"s":3,"t":"GUILD_CREATE","d":{}}"#);
        dispatcher.handle_text(r#"{"d":{}}"#);

        assert_eq!(session.sequence(), Some(3));
    }

    #[tokio::test]
    async fn test_drain_aborts_slow_handlers() {
        let mut registry = Registry::new();
        registry.add_event_handler(
            "guild_create",
            event_handler(|_ctx, _event| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }),
        );
        let (mut dispatcher, _session) = dispatcher(registry);

        dispatcher.handle_frame(Frame::dispatch("GUILD_CREATE", 1, json!({})));
        assert_eq!(dispatcher.in_flight(), 1);

        let aborted = dispatcher.drain(Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_run_ends_on_close_and_on_cancel() {
        let (mut dispatcher, session) = dispatcher(Registry::new());
        let mut read = stream::iter(vec![
            Ok(WsMessage::text(
                Frame::dispatch("GUILD_CREATE", 5, json!({})).encode().unwrap(),
            )),
            Ok(WsMessage::Close(None)),
        ]);

        let end = dispatcher.run(&mut read, &CancellationToken::new()).await;
        assert_eq!(end, SessionEnd::Closed("closed by peer".to_string()));
        assert_eq!(session.sequence(), Some(5));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut silent = stream::pending::<Result<WsMessage, WsError>>();
        assert_eq!(dispatcher.run(&mut silent, &cancel).await, SessionEnd::Shutdown);
    }
}
