//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the token signing secret.
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
/// Environment variable overriding the listener port.
pub const ENV_SERVER_PORT: &str = "SERVER_PORT";
/// Environment variable overriding the SQLite path.
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {name}: {reason}")]
    Env { name: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: TOML file (or defaults), then process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Like [`load_config`], with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Deserialize a TOML document; missing fields take their defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `JWT_SECRET`, `SERVER_PORT` and `DATABASE_PATH`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(secret) = get(ENV_JWT_SECRET) {
        config.auth.jwt_secret = Some(secret);
    }

    if let Some(port) = get(ENV_SERVER_PORT) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: ENV_SERVER_PORT,
            reason: format!("'{}' is not a port number", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(path) = get(ENV_DATABASE_PATH) {
        config.database.path = path;
    }

    Ok(())
}
