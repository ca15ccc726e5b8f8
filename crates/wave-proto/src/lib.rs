//! # wave-proto
//!
//! Wire-level definitions for the wavebot gateway: the frame envelope and its
//! operation codes, the intents bitmask sent at identify time, and the plain
//! entity types carried in dispatch payloads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod intents;
pub mod model;
pub mod opcode;

pub use error::ProtoError;
pub use frame::{ConnectionProperties, Frame, Hello, Identify};
pub use intents::Intents;
pub use model::{CreateMessage, Message, MessageReference, Ready, User};
pub use opcode::OpCode;
