//! Handler registration table.
//!
//! Event handlers are keyed by canonical event name and kept in registration
//! order; commands are keyed by their exact name. The table is filled in
//! before the client connects and only read afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use wave_proto::Message;

use crate::context::Context;
use crate::error::HandlerResult;
use crate::gateway::events::{Event, canonical_event_name};

/// Callback invoked for a named event.
pub type EventHandler = Arc<dyn Fn(Context, Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Callback invoked for a command with the text after the command name.
pub type CommandHandler =
    Arc<dyn Fn(Context, Message, String) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, event| Box::pin(f(ctx, event)))
}

/// Wrap an async closure as a [`CommandHandler`].
pub fn command_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Context, Message, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, message, args| Box::pin(f(ctx, message, args)))
}

/// A registered command.
#[derive(Clone)]
pub struct Command {
    /// Name matched against the first word after the prefix.
    pub name: String,
    /// Human-readable description, may be empty.
    pub description: String,
    /// Callback.
    pub handler: CommandHandler,
}

impl Command {
    /// Create a command.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Event handlers and commands known to a client.
#[derive(Default, Clone)]
pub struct Registry {
    events: HashMap<String, Vec<EventHandler>>,
    commands: BTreeMap<String, Command>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event`. The name is matched case-insensitively.
    pub fn add_event_handler(&mut self, event: &str, handler: EventHandler) {
        self.events
            .entry(canonical_event_name(event))
            .or_default()
            .push(handler);
    }

    /// Register a command, returning the one it replaces.
    pub fn add_command(&mut self, command: Command) -> Option<Command> {
        self.commands.insert(command.name.clone(), command)
    }

    /// Handlers for a canonical event name, in registration order.
    #[must_use]
    pub fn handlers(&self, event: &str) -> &[EventHandler] {
        self.events.get(event).map_or(&[], Vec::as_slice)
    }

    /// Look up a command by exact name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// All commands, ordered by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Number of handlers across all events.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: BTreeMap<_, _> = self.events.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Registry")
            .field("events", &events)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_event() -> EventHandler {
        event_handler(|_ctx, _event| async { Ok(()) })
    }

    fn noop_command() -> CommandHandler {
        command_handler(|_ctx, _message, _args| async { Ok(()) })
    }

    #[test]
    fn test_event_names_are_case_insensitive() {
        let mut registry = Registry::new();
        registry.add_event_handler("MESSAGE_CREATE", noop_event());
        registry.add_event_handler("message_create", noop_event());
        registry.add_event_handler("Ready", noop_event());

        assert_eq!(registry.handlers("message_create").len(), 2);
        assert_eq!(registry.handlers("ready").len(), 1);
        assert!(registry.handlers("guild_create").is_empty());
        assert_eq!(registry.handler_count(), 3);
    }

    #[test]
    fn test_command_lookup_is_exact() {
        let mut registry = Registry::new();
        registry.add_command(Command::new("echo", "Repeats your message", noop_command()));

        assert!(registry.command("echo").is_some());
        assert!(registry.command("Echo").is_none());
        assert!(registry.command("ech").is_none());
    }

    #[test]
    fn test_command_reregistration_replaces() {
        let mut registry = Registry::new();
        assert!(registry.add_command(Command::new("ping", "first", noop_command())).is_none());
        let replaced = registry.add_command(Command::new("ping", "second", noop_command()));

        assert_eq!(replaced.map(|c| c.description), Some("first".to_string()));
        assert_eq!(registry.command("ping").map(|c| c.description.as_str()), Some("second"));
        assert_eq!(registry.commands().count(), 1);
    }

    #[test]
    fn test_commands_listed_by_name() {
        let mut registry = Registry::new();
        for name in ["userinfo", "echo", "help", "ping"] {
            registry.add_command(Command::new(name, "", noop_command()));
        }
        let names: Vec<_> = registry.commands().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "help", "ping", "userinfo"]);
    }

    #[test]
    fn test_wrapped_handlers_run() {
        use crate::rest::RestClient;
        use crate::session::Session;
        use tokio_test::{assert_err, assert_ok, block_on};

        let ctx = Context::new(
            Arc::new(RestClient::new("t", "http://127.0.0.1:9/api", 10)),
            Arc::new(Session::new()),
            Arc::new(Registry::new()),
            '!',
        );
        let event = Event::Dispatch {
            name: "typing_start".to_string(),
            data: serde_json::Value::Null,
        };

        let ok = event_handler(|_ctx, event| async move {
            assert_eq!(event.name(), "typing_start");
            Ok(())
        });
        assert_ok!(block_on(ok(ctx.clone(), event.clone())));

        let failing = command_handler(|_ctx, _message, args| async move {
            Err(format!("bad args: {args}").into())
        });
        let err = assert_err!(block_on(failing(ctx, Message::default(), "x".to_string())));
        assert_eq!(err.to_string(), "bad args: x");
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = Registry::new();
        registry.add_event_handler("ready", noop_event());
        registry.add_command(Command::new("ping", "", noop_command()));
        let debug = format!("{registry:?}");
        assert!(debug.contains("ready"));
        assert!(debug.contains("ping"));
    }
}
