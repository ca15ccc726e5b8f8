//! Prefix command routing.
//!
//! A message is a command when its content starts with the configured
//! prefix. The first whitespace-delimited word after the prefix names the
//! command and everything after that word is passed through as arguments.

use std::sync::Arc;

use futures::future::BoxFuture;
use wave_proto::Message;

use crate::context::Context;
use crate::error::HandlerResult;
use crate::handlers::{Command, Registry};

/// A command name and its argument text, borrowed from message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    /// Command name, without the prefix.
    pub name: &'a str,
    /// Text after the first whitespace following the name. Empty when absent.
    pub args: &'a str,
}

/// Split `content` into a command name and arguments.
///
/// Returns `None` when `content` does not start with `prefix`.
#[must_use]
pub fn parse_command(content: &str, prefix: char) -> Option<ParsedCommand<'_>> {
    let rest = content.strip_prefix(prefix)?;
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some(ParsedCommand { name, args })
}

/// A matched command ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The command that matched.
    pub command: Command,
    /// Message that triggered it.
    pub message: Message,
    /// Argument text.
    pub args: String,
}

impl Invocation {
    /// Build the command's future.
    pub fn into_future(self, ctx: Context) -> BoxFuture<'static, HandlerResult> {
        (self.command.handler)(ctx, self.message, self.args)
    }
}

/// Maps prefixed messages to registered commands.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: char,
    registry: Arc<Registry>,
}

impl CommandRouter {
    /// Create a router over `registry`.
    #[must_use]
    pub const fn new(prefix: char, registry: Arc<Registry>) -> Self {
        Self { prefix, registry }
    }

    /// Configured prefix.
    #[must_use]
    pub const fn prefix(&self) -> char {
        self.prefix
    }

    /// Find the command a message invokes.
    ///
    /// Unknown commands and unprefixed messages yield `None`.
    #[must_use]
    pub fn route(&self, message: &Message) -> Option<Invocation> {
        let parsed = parse_command(&message.content, self.prefix)?;
        let command = self.registry.command(parsed.name)?;
        Some(Invocation {
            command: command.clone(),
            message: message.clone(),
            args: parsed.args.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::command_handler;
    use test_case::test_case;

    #[test_case("!echo hello world", Some(("echo", "hello world")) ; "with arguments")]
    #[test_case("!echo", Some(("echo", "")) ; "without arguments")]
    #[test_case("!echo ", Some(("echo", "")) ; "trailing space")]
    #[test_case("!echo  two  spaces", Some(("echo", " two  spaces")) ; "splits on first whitespace only")]
    #[test_case("!ping\tnow", Some(("ping", "now")) ; "tab separator")]
    #[test_case("!", Some(("", "")) ; "bare prefix")]
    #[test_case("echo hello", None ; "no prefix")]
    #[test_case(" !echo", None ; "leading space")]
    #[test_case("", None ; "empty")]
    fn test_parse_command(content: &str, expected: Option<(&str, &str)>) {
        let parsed = parse_command(content, '!').map(|p| (p.name, p.args));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_command_custom_prefix() {
        let parsed = parse_command("?help me", '?').expect("parsed");
        assert_eq!(parsed.name, "help");
        assert_eq!(parsed.args, "me");
        assert!(parse_command("!help", '?').is_none());
    }

    fn router() -> CommandRouter {
        let mut registry = Registry::new();
        registry.add_command(Command::new(
            "echo",
            "Repeats your message",
            command_handler(|_ctx, _message, _args| async { Ok(()) }),
        ));
        CommandRouter::new('!', Arc::new(registry))
    }

    fn message(content: &str) -> Message {
        Message {
            id: "1".to_string(),
            channel_id: "2".to_string(),
            content: content.to_string(),
            ..Message::default()
        }
    }

    #[test]
    fn test_route_registered_command() {
        let invocation = router().route(&message("!echo hello world")).expect("routed");
        assert_eq!(invocation.command.name, "echo");
        assert_eq!(invocation.args, "hello world");
        assert_eq!(invocation.message.content, "!echo hello world");
    }

    #[test]
    fn test_route_without_args_gives_empty_string() {
        let invocation = router().route(&message("!echo")).expect("routed");
        assert_eq!(invocation.args, "");
    }

    #[test_case("!unknown thing" ; "unregistered")]
    #[test_case("!Echo hi" ; "case sensitive")]
    #[test_case("echo hi" ; "no prefix")]
    fn test_route_ignores(content: &str) {
        assert!(router().route(&message(content)).is_none());
    }
}
