//! Base traits and types for upstream realtime voice sessions.
//!
//! An upstream session is a full-duplex connection to a realtime voice API.
//! Captured audio is pushed with [`BaseRealtime::send_audio`]; everything the
//! upstream produces (text deltas, audio deltas, interrupts, tool calls) is
//! pulled one event at a time with [`BaseRealtime::next_event`] by the
//! session's message pump.
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian at 24kHz, mono.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The upstream ended the connection
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Base configuration for realtime providers.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint; the provider default is used when empty
    #[serde(default)]
    pub url: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview")
    #[serde(default)]
    pub model: String,

    /// Voice ID for audio output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Tool definitions for function calling
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"[REDACTED]")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("turn_detection", &self.turn_detection)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        /// Whether to create a response when the turn ends
        #[serde(default, skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        /// Interrupt model output on speech detection
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
            create_response: Some(true),
            interrupt_response: Some(true),
        }
    }
}

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }
}

/// Function definition for tool calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Audio data produced by the upstream.
#[derive(Debug, Clone)]
pub struct RealtimeAudioData {
    /// Raw audio bytes (PCM 16-bit, 24kHz, mono, little-endian)
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Item ID from the provider
    pub item_id: Option<String>,
    /// Response ID from the provider
    pub response_id: Option<String>,
}

/// Function call request from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    /// Call ID for the function call
    pub call_id: String,
    /// Function name
    pub name: String,
    /// JSON arguments
    pub arguments: String,
    /// Item ID
    pub item_id: Option<String>,
}

/// One unit of upstream output, in the order the upstream produced it.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// Incremental assistant text (or transcript of assistant audio)
    TextDelta(String),
    /// Incremental assistant audio
    AudioDelta(RealtimeAudioData),
    /// The user started speaking; playback should stop
    Interrupt,
    /// The model wants a tool invoked
    FunctionCall(FunctionCallRequest),
    /// A response finished; carries the response id
    ResponseDone(String),
}

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for upstream realtime voice sessions.
///
/// All methods take `&self`: the message pump, the audio streamer and the
/// dispatch path share one handle. `next_event` is only called by the pump.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Connect to the realtime provider and configure the session.
    async fn connect(&self) -> RealtimeResult<()>;

    /// Close the connection. Calling it more than once is harmless.
    async fn close(&self) -> RealtimeResult<()>;

    /// Check if the provider is connected and ready.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Send audio data to the provider.
    ///
    /// Audio should be PCM 16-bit, 24kHz, mono, little-endian.
    async fn send_audio(&self, audio_data: Bytes) -> RealtimeResult<()>;

    /// Submit a function call result.
    async fn submit_function_result(&self, call_id: &str, result: &str) -> RealtimeResult<()>;

    /// Request the model to generate a response.
    async fn create_response(&self) -> RealtimeResult<()>;

    /// Wait for the next upstream event.
    ///
    /// Returns `None` once the upstream stream has ended.
    async fn next_event(&self) -> Option<RealtimeResult<RealtimeEvent>>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

// =============================================================================
// Factory
// =============================================================================

/// Shared trait object for realtime providers.
pub type SharedRealtime = Arc<dyn BaseRealtime>;

/// Factory trait for creating realtime providers.
pub trait RealtimeFactory: Send + Sync {
    /// Create a new, not yet connected provider from configuration.
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<SharedRealtime>;
}
