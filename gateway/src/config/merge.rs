use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, env};

/// Load the environment base and apply YAML overrides on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(static_dir) = server.static_dir {
            config.static_dir = PathBuf::from(static_dir);
        }
        if server.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = server.cors_allowed_origins;
        }
    }

    if let Some(key) = yaml.providers.and_then(|providers| providers.openai_api_key) {
        config.openai_api_key = Some(key);
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(url) = realtime.url {
            config.realtime_url = url;
        }
        if let Some(model) = realtime.model {
            config.realtime_model = model;
        }
        if realtime.voice.is_some() {
            config.realtime_voice = realtime.voice;
        }
        if realtime.instructions.is_some() {
            config.realtime_instructions = realtime.instructions;
        }
        if let Some(seconds) = realtime.connect_timeout_seconds {
            config.upstream_connect_timeout_seconds = seconds;
        }
    }

    if let Some(tools) = yaml.tools {
        config.phone_directory.extend(tools.phone_directory);
    }

    Ok(config)
}
