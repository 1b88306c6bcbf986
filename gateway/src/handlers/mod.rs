//! HTTP and WebSocket request handlers
//!
//! - `api` - Index page and health check
//! - `realtime` - Per-client realtime voice WebSocket

pub mod api;
pub mod realtime;

pub use realtime::realtime_handler;
