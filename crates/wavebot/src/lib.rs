//! wavebot - gateway client for chat bots
//!
//! Connects to a Discord-style gateway, performs the HELLO/IDENTIFY
//! handshake, keeps the connection alive with heartbeats and hands every
//! dispatched event to registered handlers. Messages that start with the
//! configured prefix are also routed to named commands.
//!
//! ```no_run
//! use wavebot::{ClientConfig, GatewayClient};
//!
//! # async fn demo() -> Result<(), wavebot::GatewayError> {
//! GatewayClient::new(ClientConfig::new("token"))
//!     .with_command("ping", "Replies with Pong!", |ctx, message, _args| async move {
//!         ctx.reply(&message, "Pong!").await?;
//!         Ok(())
//!     })
//!     .run()
//!     .await
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod rest;
pub mod session;

pub use commands::{CommandRouter, ParsedCommand, parse_command};
pub use config::ClientConfig;
pub use context::Context;
pub use error::{GatewayError, HandlerError, HandlerResult};
pub use gateway::{ConnectionState, Event, GatewayClient, ShutdownHandle};
pub use handlers::{Command, Registry};
pub use rest::RestClient;
pub use session::Session;

pub use wave_proto::{Intents, Message, User};
