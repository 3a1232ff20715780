//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and combinations.
//! All errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, WindowLimit};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("not a socket address: {:?}", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    let log = &config.access_log;
    if log.out_file.is_empty() || log.error_file.is_empty() {
        errors.push(ValidationError::new("access_log", "sink file names must not be empty"));
    }
    if log.out_file == log.error_file {
        errors.push(ValidationError::new(
            "access_log.error_file",
            "success and error sinks must be different files",
        ));
    }
    if log.out_max_bytes == Some(0) {
        errors.push(ValidationError::new("access_log.out_max_bytes", "must be > 0"));
    }
    if log.error_max_bytes == Some(0) {
        errors.push(ValidationError::new("access_log.error_max_bytes", "must be > 0"));
    }
    if log.check_interval_ms == 0 {
        errors.push(ValidationError::new("access_log.check_interval_ms", "must be > 0"));
    }
    if log.queue_capacity == 0 {
        errors.push(ValidationError::new("access_log.queue_capacity", "must be > 0"));
    }

    check_window(&mut errors, "rate_limit.global", config.rate_limit.global);
    check_window(&mut errors, "rate_limit.strict", config.rate_limit.strict);

    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be > 0"));
    }
    if config.auth.token_secret.is_empty() {
        errors.push(ValidationError::new("auth.token_secret", "must not be empty"));
    }

    if config.upload.max_files == 0 {
        errors.push(ValidationError::new("upload.max_files", "must be > 0"));
    }
    if config.upload.max_file_size == 0 {
        errors.push(ValidationError::new("upload.max_file_size", "must be > 0"));
    }

    let db = &config.database;
    if db.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be > 0"));
    }
    if db.min_connections > db.max_connections {
        errors.push(ValidationError::new(
            "database.min_connections",
            "must not exceed database.max_connections",
        ));
    }
    if !is_identifier(&db.passthrough_table) {
        errors.push(ValidationError::new(
            "database.passthrough_table",
            format!("not a plain table name: {:?}", db.passthrough_table),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Letters, digits and underscores only.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_window(errors: &mut Vec<ValidationError>, field: &str, window: WindowLimit) {
    if window.window_secs == 0 {
        errors.push(ValidationError::new(format!("{}.window_secs", field), "must be > 0"));
    }
    if window.max_requests == 0 {
        errors.push(ValidationError::new(format!("{}.max_requests", field), "must be > 0"));
    }
}
