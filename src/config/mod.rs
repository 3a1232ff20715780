//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing sections)
//!     → .env / process environment (APP_ENV, PORT, TOKEN_SECRET, LOG_ROTATE_*, DB_*)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::AccessLogConfig;
pub use schema::AppConfig;
pub use schema::DatabaseConfig;
pub use schema::Environment;
pub use schema::RateLimitConfig;
pub use schema::UploadConfig;
pub use schema::WindowLimit;
