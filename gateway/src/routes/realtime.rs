//! Realtime WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Realtime WebSocket router
///
/// # Endpoint
///
/// `GET /ws/{client_id}` - WebSocket upgrade bound to one session per client id
///
/// # Protocol
///
/// Clients send JSON text frames:
/// - `{"type": "audio", "content": [..bytes..]}` microphone audio (binary frames also work)
/// - `{"type": "command", "content": "stop"}` to end the session
///
/// Server responds with:
/// - `{"type": "text", "content": "..."}` for assistant text deltas
/// - Binary frames for assistant audio (PCM 16-bit, 24kHz, mono)
/// - `{"type": "error", "content": "..."}` before closing on failure
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/{client_id}", get(realtime_handler))
        .layer(TraceLayer::new_for_http())
}
