//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the file if it exists (defaults otherwise), apply process
/// environment overrides, then validate the result.
pub fn load_from_env(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        Some(path) => {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            AppConfig::default()
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables on top of `config`.
///
/// `lookup` abstracts the environment so overrides can be tested without
/// touching process state.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
        config.environment = Environment::from_env_value(&env);
    }

    let host = lookup("HOST");
    let port = lookup("PORT");
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = config
            .server
            .bind_address
            .rsplit_once(':')
            .unwrap_or(("0.0.0.0", "8080"));
        let host = host.unwrap_or_else(|| current_host.to_string());
        let port = port.unwrap_or_else(|| current_port.to_string());
        config.server.bind_address = format!("{}:{}", host, port);
    }

    if let Some(base_url) = lookup("BASE_URL") {
        config.server.base_url = base_url;
    }
    if let Some(secret) = lookup("TOKEN_SECRET") {
        config.auth.token_secret = secret;
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(host) = lookup("DB_HOST") {
        config.database.host = host;
    }
    if let Some(port) = lookup("DB_PORT") {
        config.database.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var: "DB_PORT", value: port })?;
    }
    if let Some(user) = lookup("DB_USER") {
        config.database.user = Some(user);
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        config.database.password = Some(password);
    }
    if let Some(name) = lookup("DB_NAME") {
        config.database.name = Some(name);
    }
    if let Some(value) = lookup("LOG_ROTATE_OUT_BYTES") {
        config.access_log.out_max_bytes = Some(parse_bytes("LOG_ROTATE_OUT_BYTES", value)?);
    }
    if let Some(value) = lookup("LOG_ROTATE_ERROR_BYTES") {
        config.access_log.error_max_bytes = Some(parse_bytes("LOG_ROTATE_ERROR_BYTES", value)?);
    }

    Ok(())
}

fn parse_bytes(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
