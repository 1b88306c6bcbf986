//! Upstream realtime voice sessions.
//!
//! - `BaseRealtime` trait for provider abstraction
//! - `RealtimeFactory` for per-session client creation
//! - Pull-based event delivery through `BaseRealtime::next_event`

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, ConnectionState, FunctionCallRequest, FunctionDefinition, RealtimeAudioData,
    RealtimeConfig, RealtimeError, RealtimeEvent, RealtimeFactory, RealtimeResult,
    SharedRealtime, ToolDefinition, TurnDetectionConfig,
};
pub use openai::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeFactory,
    OpenAIRealtimeVoice,
};
