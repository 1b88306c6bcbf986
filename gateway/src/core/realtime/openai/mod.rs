//! OpenAI Realtime API module.
//!
//! Bidirectional audio streaming with OpenAI's Realtime API: server-side VAD,
//! text and audio deltas, and function calling.
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
pub mod messages;

pub use client::{OpenAIRealtime, OpenAIRealtimeFactory};
pub use config::{
    OPENAI_REALTIME_AUDIO_FORMAT, OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};
