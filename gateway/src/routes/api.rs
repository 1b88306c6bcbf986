use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router
///
/// - `GET /` serves `index.html` from the configured static directory
/// - `GET /health` reports status and the number of live sessions
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
}
