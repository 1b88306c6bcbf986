use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::session::SessionManager;
use crate::core::tools::ToolRegistry;

/// Shared application state
///
/// Holds the loaded configuration and the session registry.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionManager,
}

impl AppState {
    /// Build state with the OpenAI upstream and browser audio.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let sessions = SessionManager::builder(config.realtime_config())
            .tools(ToolRegistry::with_defaults(&config.phone_directory))
            .connect_timeout(config.connect_timeout())
            .build();

        Self::with_sessions(config, sessions)
    }

    /// Build state around an existing session manager.
    pub fn with_sessions(config: ServerConfig, sessions: SessionManager) -> Arc<Self> {
        Arc::new(Self { config, sessions })
    }
}
