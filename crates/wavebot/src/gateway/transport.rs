//! Websocket message classification shared by the handshake and dispatch loops.

use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// What a websocket read means to the gateway layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A text payload to decode as a frame.
    Text(String),
    /// Transport-level traffic (ping, pong, raw frames) with no gateway meaning.
    Skip,
    /// The connection is gone.
    Closed(String),
}

/// Classify the next item from the websocket read half.
pub(crate) fn classify(item: Option<Result<WsMessage, WsError>>) -> Inbound {
    match item {
        Some(Ok(WsMessage::Text(text))) => Inbound::Text(text.as_str().to_owned()),
        Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
            Ok(text) => Inbound::Text(text.to_owned()),
            Err(_) => Inbound::Skip,
        },
        Some(Ok(WsMessage::Close(frame))) => Inbound::Closed(frame.map_or_else(
            || "closed by peer".to_string(),
            |f| format!("closed by peer ({}): {}", u16::from(f.code), f.reason.as_str()),
        )),
        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => Inbound::Skip,
        Some(Err(e)) => Inbound::Closed(e.to_string()),
        None => Inbound::Closed("connection closed".to_string()),
    }
}
