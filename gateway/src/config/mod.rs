//! Configuration module for the realtime relay
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use realtime_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::realtime::RealtimeConfig;

mod env;
mod merge;
mod validation;
mod yaml;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Server configuration
///
/// Contains all configuration needed to run the relay:
/// - Server settings (host, port, static assets, CORS)
/// - Upstream realtime settings (API key, endpoint, model, voice, instructions)
/// - Tool settings (phone directory entries)
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// OpenAI API key for the realtime upstream
    pub openai_api_key: Option<String>,
    /// Realtime WebSocket endpoint
    /// Default: wss://api.openai.com/v1/realtime
    pub realtime_url: String,
    /// Default: gpt-4o-realtime-preview
    pub realtime_model: String,
    pub realtime_voice: Option<String>,
    pub realtime_instructions: Option<String>,
    /// Bound on the upstream handshake. 0 disables the bound.
    /// Default: 10
    pub upstream_connect_timeout_seconds: u64,

    /// Directory holding `index.html`
    /// Default: static
    pub static_dir: PathBuf,

    /// Comma-separated list of allowed origins, or "*" for any origin.
    /// Default: None (same-origin only)
    pub cors_allowed_origins: Option<String>,

    /// Extra `get_phone_number` entries, merged over the built-in ones
    pub phone_directory: HashMap<String, String>,
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("realtime_url", &self.realtime_url)
            .field("realtime_model", &self.realtime_model)
            .field("realtime_voice", &self.realtime_voice)
            .field("realtime_instructions", &self.realtime_instructions)
            .field(
                "upstream_connect_timeout_seconds",
                &self.upstream_connect_timeout_seconds,
            )
            .field("static_dir", &self.static_dir)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("phone_directory", &self.phone_directory)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Missing variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_openai_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Upstream connect bound; `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.upstream_connect_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Base upstream configuration shared by every session.
    ///
    /// Turn detection and tools are filled in by the session manager.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: self.realtime_voice.clone(),
            instructions: self.realtime_instructions.clone(),
            turn_detection: None,
            tools: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            openai_api_key: Some("sk-test".to_string()),
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            realtime_voice: Some("alloy".to_string()),
            realtime_instructions: None,
            upstream_connect_timeout_seconds: 10,
            static_dir: PathBuf::from("static"),
            cors_allowed_origins: None,
            phone_directory: HashMap::new(),
        }
    }

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("OPENAI_REALTIME_URL");
            env::remove_var("OPENAI_REALTIME_MODEL");
            env::remove_var("OPENAI_REALTIME_VOICE");
            env::remove_var("OPENAI_REALTIME_INSTRUCTIONS");
            env::remove_var("UPSTREAM_CONNECT_TIMEOUT_SECONDS");
            env::remove_var("STATIC_DIR");
            env::remove_var("CORS_ALLOWED_ORIGINS");
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(test_config().address(), "127.0.0.1:8000");
    }

    #[test]
    fn test_connect_timeout() {
        let mut config = test_config();
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(10)));
        config.upstream_connect_timeout_seconds = 0;
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_realtime_config() {
        let realtime = test_config().realtime_config();
        assert_eq!(realtime.api_key, "sk-test");
        assert_eq!(realtime.model, "gpt-4o-realtime-preview");
        assert_eq!(realtime.voice.as_deref(), Some("alloy"));
        assert!(realtime.turn_detection.is_none());
        assert!(realtime.tools.is_none());
    }

    #[test]
    fn test_has_openai_api_key() {
        let mut config = test_config();
        assert!(config.has_openai_api_key());
        config.openai_api_key = Some("  ".to_string());
        assert!(!config.has_openai_api_key());
        config.openai_api_key = None;
        assert!(!config.has_openai_api_key());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.realtime_url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.realtime_model, "gpt-4o-realtime-preview");
        assert_eq!(config.upstream_connect_timeout_seconds, 10);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert!(config.phone_directory.is_empty());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "9001");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("OPENAI_REALTIME_VOICE", "verse");
            env::set_var("UPSTREAM_CONNECT_TIMEOUT_SECONDS", "0");
            env::set_var("STATIC_DIR", "/srv/static");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.address(), "127.0.0.1:9001");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.realtime_voice.as_deref(), Some("verse"));
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.static_dir, PathBuf::from("/srv/static"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "PORT", .. })
        ));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080
  static_dir: "/tmp/relay-static"

providers:
  openai_api_key: "yaml-key"

realtime:
  model: "gpt-4o-mini-realtime-preview"
  voice: "sage"
  instructions: "Be brief."
  connect_timeout_seconds: 3

tools:
  phone_directory:
    Ada: "5550000"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.static_dir, PathBuf::from("/tmp/relay-static"));
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.realtime_model, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.realtime_voice.as_deref(), Some("sage"));
        assert_eq!(config.realtime_instructions.as_deref(), Some("Be brief."));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(
            config.phone_directory.get("Ada").map(String::as_str),
            Some("5550000")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "7000");
            env::set_var("OPENAI_API_KEY", "env-key");
            env::set_var("OPENAI_REALTIME_VOICE", "ash");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  port: 7100
providers:
  openai_api_key: "yaml-key"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.port, 7100);
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        // Not in YAML, so ENV is used
        assert_eq!(config.realtime_voice.as_deref(), Some("ash"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  port: [not, a, port]\n").unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_realtime_url() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "realtime:\n  url: \"https://example.com\"\n").unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "realtime_url",
                ..
            })
        ));
    }
}
