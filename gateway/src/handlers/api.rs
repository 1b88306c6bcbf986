use axum::{Json, extract::State, response::Html};
use serde::Serialize;
use std::io::ErrorKind;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        active_sessions: state.sessions.active_sessions(),
    })
}

/// Serve the browser client page from the static directory.
pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let path = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "index.html not found");
            Err(AppError::NotFound("index.html not found".to_string()))
        }
        Err(e) => Err(AppError::Internal(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}
