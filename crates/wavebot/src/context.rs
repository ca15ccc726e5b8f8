//! Context handed to event and command handlers.

use std::sync::Arc;

use wave_proto::{CreateMessage, Message, User};

use crate::error::GatewayError;
use crate::handlers::{Command, Registry};
use crate::rest::RestClient;
use crate::session::Session;

/// Shared handles available to every handler invocation.
///
/// Cheap to clone; every field is reference counted.
#[derive(Debug, Clone)]
pub struct Context {
    http: Arc<RestClient>,
    session: Arc<Session>,
    registry: Arc<Registry>,
    command_prefix: char,
}

impl Context {
    /// Create a context.
    #[must_use]
    pub const fn new(
        http: Arc<RestClient>,
        session: Arc<Session>,
        registry: Arc<Registry>,
        command_prefix: char,
    ) -> Self {
        Self {
            http,
            session,
            registry,
            command_prefix,
        }
    }

    /// REST client for the current token.
    #[must_use]
    pub fn http(&self) -> &RestClient {
        &self.http
    }

    /// Session state for the current connection.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The bot user, once READY has been received.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.session.user()
    }

    /// Registered commands, ordered by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.registry.commands()
    }

    /// Configured command prefix.
    #[must_use]
    pub const fn command_prefix(&self) -> char {
        self.command_prefix
    }

    /// Reply to `message` in its channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the REST call fails.
    pub async fn reply(
        &self,
        message: &Message,
        content: impl Into<String>,
    ) -> Result<Message, GatewayError> {
        self.http.reply(message, content).await
    }

    /// Post a plain message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the REST call fails.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: impl Into<String>,
    ) -> Result<Message, GatewayError> {
        self.http
            .send_message(channel_id, &CreateMessage::new(content))
            .await
    }
}
