//! Messages flowing into and out of a session.

use bytes::Bytes;

/// A decoded message from the client, processed in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Captured microphone audio to forward upstream
    Audio(Bytes),
    /// The client asked to end the session
    StopCommand,
}

/// An event for the client, delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Incremental assistant text
    TextDelta { text: String },
    /// A failure that ends the session
    Error { message: String },
}

impl ServerEvent {
    pub fn text(text: impl Into<String>) -> Self {
        ServerEvent::TextDelta { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ServerEvent::Error { .. })
    }
}

/// One item on a session's outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRoute {
    /// Sent to the client as a JSON text frame
    Event(ServerEvent),
    /// Assistant audio, sent to the client as a binary frame
    Audio(Bytes),
}

impl SessionRoute {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionRoute::Event(event) if event.is_error())
    }
}

impl From<ServerEvent> for SessionRoute {
    fn from(event: ServerEvent) -> Self {
        SessionRoute::Event(event)
    }
}
