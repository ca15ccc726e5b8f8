//! Entity types carried in dispatch payloads and REST responses.
//!
//! These are plain field containers. Missing optional fields fall back to
//! their defaults so that partial payloads still produce a value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ProtoError;

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    #[serde(default)]
    pub id: String,
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Legacy discriminator.
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Avatar hash.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Whether the account is a bot.
    #[serde(default)]
    pub bot: bool,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Message ID.
    #[serde(default)]
    pub id: String,
    /// Channel the message was posted in.
    #[serde(default)]
    pub channel_id: String,
    /// Guild, absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Author.
    #[serde(default)]
    pub author: Option<User>,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// When the message was sent. Unparseable values are dropped.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

impl Message {
    /// Build a message from a `MESSAGE_CREATE` payload or REST response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidPayload`] if a present field has the wrong type.
    pub fn from_payload(data: &Value) -> Result<Self, ProtoError> {
        Self::deserialize(data).map_err(|e| ProtoError::InvalidPayload {
            kind: "message",
            reason: e.to_string(),
        })
    }

    /// Whether the author is a bot account.
    #[must_use]
    pub fn is_from_bot(&self) -> bool {
        self.author.as_ref().is_some_and(|a| a.bot)
    }
}

/// Payload of the `READY` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ready {
    /// Session identifier.
    pub session_id: String,
    /// The authenticated bot user.
    pub user: User,
}

impl Ready {
    /// Build from a `READY` payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidPayload`] if `session_id` or `user` is missing.
    pub fn from_payload(data: &Value) -> Result<Self, ProtoError> {
        Self::deserialize(data).map_err(|e| ProtoError::InvalidPayload {
            kind: "ready",
            reason: e.to_string(),
        })
    }
}

/// Reference to an existing message, used for replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    /// Referenced message ID.
    pub message_id: String,
}

/// Body of a create-message REST call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateMessage {
    /// Text content.
    pub content: String,
    /// Message being replied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

impl CreateMessage {
    /// Plain message.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_reference: None,
        }
    }

    /// Mark the message as a reply to `message_id`.
    #[must_use]
    pub fn reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.message_reference = Some(MessageReference {
            message_id: message_id.into(),
        });
        self
    }
}
