//! Realtime WebSocket message types
//!
//! JSON frames use a `type` tag with the payload under `content`:
//!
//! ```json
//! {"type": "audio", "content": [0, 1, 2]}
//! {"type": "command", "content": "stop"}
//! {"type": "text", "content": "Hello"}
//! {"type": "error", "content": "Upstream connection failed: ..."}
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::session::{ClientMessage, ServerEvent, SessionError};

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from client
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum IncomingMessage {
    /// Raw audio bytes
    Audio(Vec<u8>),
    /// Session command
    Command(Command),
}

/// Commands a client can send
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// End the session
    Stop,
}

impl From<IncomingMessage> for ClientMessage {
    fn from(message: IncomingMessage) -> Self {
        match message {
            IncomingMessage::Audio(bytes) => ClientMessage::Audio(Bytes::from(bytes)),
            IncomingMessage::Command(Command::Stop) => ClientMessage::StopCommand,
        }
    }
}

/// Decode a text frame. Unknown types and commands are decode errors.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, SessionError> {
    serde_json::from_str::<IncomingMessage>(text)
        .map(ClientMessage::from)
        .map_err(|e| SessionError::Decode(e.to_string()))
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to client
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum OutgoingMessage {
    /// Incremental assistant text
    Text(String),
    /// Error description; the session ends after it
    Error(String),
}

impl From<ServerEvent> for OutgoingMessage {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::TextDelta { text } => OutgoingMessage::Text(text),
            ServerEvent::Error { message } => OutgoingMessage::Error(message),
        }
    }
}
