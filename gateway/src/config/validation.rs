use url::Url;

use super::{ConfigError, ServerConfig};

pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_port(config.port)?;
    validate_realtime_url(&config.realtime_url)?;
    validate_model(&config.realtime_model)
}

fn validate_port(port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidValue {
            name: "port",
            reason: "port must be between 1 and 65535".to_string(),
        });
    }
    Ok(())
}

fn validate_realtime_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        name: "realtime_url",
        reason: format!("{raw:?}: {e}"),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(ConfigError::InvalidValue {
            name: "realtime_url",
            reason: format!("expected ws:// or wss://, got {scheme}://"),
        }),
    }
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "realtime_model",
            reason: "model must not be empty".to_string(),
        });
    }
    Ok(())
}
