//! Client configuration.
//!
//! Loaded from a TOML file by the `wavebot` binary, or built in code by
//! applications embedding the client:
//!
//! ```toml
//! token = "..."              # usually supplied through WAVEBOT_TOKEN instead
//! intents = ["messages", "message_content"]
//! command_prefix = "!"
//! hello_timeout_secs = 30
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use wave_proto::{ConnectionProperties, Intents};

use crate::error::GatewayError;

const DEFAULT_API_BASE: &str = "https://discord.com/api";
const DEFAULT_API_VERSION: u8 = 10;

/// Configuration for a [`GatewayClient`](crate::GatewayClient).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bot token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Intents requested at IDENTIFY, as names or a raw bitmask.
    #[serde(
        default,
        serialize_with = "serialize_intents",
        deserialize_with = "deserialize_intents"
    )]
    pub intents: Intents,
    /// Character that marks a message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,
    /// REST API base URL, without the version segment.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API and gateway protocol version.
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    /// Fixed gateway URL; when unset it is resolved through the REST API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// How long to wait for HELLO after connecting.
    #[serde(default = "default_hello_timeout_secs")]
    pub hello_timeout_secs: u64,
    /// How long to wait for in-flight handlers when the session ends.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    /// Client identification sent with IDENTIFY.
    #[serde(default)]
    pub properties: ConnectionProperties,
}

fn default_command_prefix() -> char {
    '!'
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_api_version() -> u8 {
    DEFAULT_API_VERSION
}

fn default_hello_timeout_secs() -> u64 {
    30
}

fn default_drain_timeout_secs() -> u64 {
    10
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntentsSetting {
    Bits(u64),
    Names(Vec<String>),
}

fn deserialize_intents<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Intents, D::Error> {
    match IntentsSetting::deserialize(deserializer)? {
        IntentsSetting::Bits(bits) => Ok(Intents::from_bits_truncate(bits)),
        IntentsSetting::Names(names) => {
            Intents::from_names(&names).map_err(serde::de::Error::custom)
        }
    }
}

fn serialize_intents<S: Serializer>(intents: &Intents, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(intents.names())
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            intents: Intents::default(),
            command_prefix: default_command_prefix(),
            api_base: default_api_base(),
            api_version: default_api_version(),
            gateway_url: None,
            hello_timeout_secs: default_hello_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            properties: ConnectionProperties::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("intents", &self.intents)
            .field("command_prefix", &self.command_prefix)
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("gateway_url", &self.gateway_url)
            .field("hello_timeout_secs", &self.hello_timeout_secs)
            .field("drain_timeout_secs", &self.drain_timeout_secs)
            .field("properties", &self.properties)
            .finish()
    }
}

impl ClientConfig {
    /// Config with the given token and defaults everywhere else.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::default().with_token(token)
    }

    /// Set the bot token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the requested intents.
    #[must_use]
    pub const fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Set the command prefix.
    #[must_use]
    pub const fn with_command_prefix(mut self, prefix: char) -> Self {
        self.command_prefix = prefix;
        self
    }

    /// Connect to a fixed gateway URL instead of asking the REST API.
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Set the REST API base URL (without the version segment).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the HELLO timeout in whole seconds.
    #[must_use]
    pub const fn with_hello_timeout_secs(mut self, secs: u64) -> Self {
        self.hello_timeout_secs = secs;
        self
    }

    /// Set the connection properties sent with IDENTIFY.
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// HELLO timeout as a duration.
    #[must_use]
    pub const fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.hello_timeout_secs)
    }

    /// Handler drain timeout as a duration.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Versioned REST base, e.g. `https://discord.com/api/v10`.
    #[must_use]
    pub fn versioned_api_base(&self) -> String {
        format!("{}/v{}", self.api_base.trim_end_matches('/'), self.api_version)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, GatewayError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, GatewayError> {
        toml::to_string_pretty(self)
            .map_err(|e| GatewayError::Config(format!("failed to serialize config: {e}")))
    }

    /// Write the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GatewayError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// A missing token is allowed here; [`require_token`](Self::require_token)
    /// checks for it once all sources have been merged.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(GatewayError::Config("token cannot be empty".to_string()));
        }

        if self.command_prefix.is_whitespace() {
            return Err(GatewayError::Config(
                "command_prefix cannot be whitespace".to_string(),
            ));
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(GatewayError::Config(
                "api_base must start with http:// or https://".to_string(),
            ));
        }

        if let Some(url) = &self.gateway_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(GatewayError::Config(
                    "gateway_url must start with ws:// or wss://".to_string(),
                ));
            }
        }

        if self.hello_timeout_secs == 0 {
            return Err(GatewayError::Config(
                "hello_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The token, or an error if none was configured.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the token is missing or blank.
    pub fn require_token(&self) -> Result<&str, GatewayError> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::Config("no bot token configured".to_string()))
    }
}
