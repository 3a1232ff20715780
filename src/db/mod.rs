//! MySQL connection pool and the table passthrough behind `GET /test`.
//!
//! The pool connects lazily, so the server starts even when the database
//! is down; the first query surfaces the problem as a 500.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row};

use crate::config::validation::is_identifier;
use crate::config::DatabaseConfig;

pub mod handlers;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] sqlx::Error),

    #[error("not a plain table name: {0:?}")]
    InvalidTable(String),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Shared pool plus the table the passthrough reads.
#[derive(Debug, Clone)]
pub struct Database {
    pool: MySqlPool,
    table: Arc<str>,
}

impl Database {
    /// Build a lazy pool from config, or `None` when no database is set.
    pub fn from_config(config: &DatabaseConfig) -> Result<Option<Self>, DbError> {
        let Some(options) = connect_options(config)? else {
            return Ok(None);
        };
        if !is_identifier(&config.passthrough_table) {
            return Err(DbError::InvalidTable(config.passthrough_table.clone()));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = config.name.as_deref().unwrap_or("<url>"),
            max_connections = config.max_connections,
            "MySQL pool configured"
        );

        Ok(Some(Self {
            pool,
            table: Arc::from(config.passthrough_table.as_str()),
        }))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every row of the passthrough table as JSON objects keyed by column.
    pub async fn select_all(&self) -> Result<Vec<Value>, DbError> {
        let sql = format!("SELECT * FROM `{}`", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connection options from a URL or from the individual fields.
pub fn connect_options(config: &DatabaseConfig) -> Result<Option<MySqlConnectOptions>, DbError> {
    if let Some(url) = &config.url {
        return MySqlConnectOptions::from_str(url)
            .map(Some)
            .map_err(DbError::InvalidUrl);
    }
    let Some(name) = &config.name else {
        return Ok(None);
    };

    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(name);
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    Ok(Some(options))
}

fn row_to_json(row: &MySqlRow) -> Value {
    let mut object = Map::new();
    for column in row.columns() {
        object.insert(column.name().to_string(), column_value(row, column.ordinal()));
    }
    Value::Object(object)
}

/// Decode a column by trying the JSON-friendly types in turn. Anything
/// else (DECIMAL and friends) is read as its text form.
fn column_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v.map_or(Value::Null, |t| Value::from(t.format("%Y-%m-%d %H:%M:%S").to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v.map_or(Value::Null, |d| Value::from(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(Value::Null, |b| Value::from(String::from_utf8_lossy(&b).into_owned()));
    }
    row.try_get_unchecked::<Option<String>, _>(index)
        .ok()
        .flatten()
        .map_or(Value::Null, Value::from)
}
