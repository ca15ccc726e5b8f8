//! Gateway websocket client.
//!
//! One connection per [`GatewayClient::run`]: HELLO/IDENTIFY handshake,
//! a heartbeat task, and a dispatch loop that fans events out to handlers.
//! Server-initiated reconnects are logged and otherwise ignored.

mod client;
mod dispatch;
pub mod events;
mod handshake;
mod heartbeat;
mod state;
mod transport;

pub use client::{GatewayClient, ShutdownHandle};
pub use dispatch::{Dispatcher, SessionEnd};
pub use events::Event;
pub use handshake::Handshake;
pub use heartbeat::{HeartbeatHandle, start_heartbeat_task};
pub use state::{AtomicConnectionState, ConnectionState};
