use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};
use crate::core::realtime::openai::{OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_URL};

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 8000;
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
pub(super) const DEFAULT_STATIC_DIR: &str = "static";

/// Read a variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT")?.unwrap_or(DEFAULT_PORT),
        openai_api_key: env_var("OPENAI_API_KEY"),
        realtime_url: env_var("OPENAI_REALTIME_URL")
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        realtime_model: env_var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|| OPENAI_REALTIME_DEFAULT_MODEL.to_string()),
        realtime_voice: env_var("OPENAI_REALTIME_VOICE"),
        realtime_instructions: env_var("OPENAI_REALTIME_INSTRUCTIONS"),
        upstream_connect_timeout_seconds: parse_env("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        static_dir: env_var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        phone_directory: HashMap::new(),
    })
}
