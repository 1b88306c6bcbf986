//! Realtime voice WebSocket handler
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **audio**: `{"type":"audio","content":[...]}` microphone audio bytes
//! - **command**: `{"type":"command","content":"stop"}` ends the session
//! - **Binary frames**: raw audio (PCM 16-bit, 24kHz, mono)
//!
//! ## Server → Client
//!
//! - **text**: `{"type":"text","content":"..."}` assistant text delta
//! - **error**: `{"type":"error","content":"..."}` fatal error, the socket closes
//! - **Binary frames**: assistant audio

mod handler;
pub mod messages;

pub use handler::realtime_handler;
