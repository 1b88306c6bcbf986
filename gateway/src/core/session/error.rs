use thiserror::Error;

use crate::core::audio::AudioError;
use crate::core::realtime::RealtimeError;

/// Errors raised while opening, driving or closing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A live session already exists for this client id
    #[error("Session already exists for client: {0}")]
    DuplicateSession(String),

    /// The upstream session could not be created or connected
    #[error("Upstream connection failed: {0}")]
    UpstreamConnect(#[source] RealtimeError),

    /// A raw client message could not be decoded
    #[error("Invalid client message: {0}")]
    Decode(String),

    /// The upstream session failed after it was established
    #[error("Upstream session failed: {0}")]
    UpstreamRuntime(#[source] RealtimeError),

    /// The audio handler could not be created
    #[error("Audio handler failed: {0}")]
    Audio(#[from] AudioError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SessionError::DuplicateSession("alice".to_string());
        assert_eq!(err.to_string(), "Session already exists for client: alice");

        let err = SessionError::UpstreamConnect(RealtimeError::Timeout("10s".to_string()));
        assert!(err.to_string().contains("Operation timed out"));

        let err = SessionError::UpstreamRuntime(RealtimeError::NotConnected);
        assert_eq!(err.to_string(), "Upstream session failed: Not connected");
    }
}
