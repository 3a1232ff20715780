//! Starter backend with a request access log.
//!
//! Every HTTP exchange produces one line in `out.log` (status < 400) or
//! `error.log`, written after the response has left the server and sized
//! from the bytes actually sent.

pub mod access_log;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upload;

pub use access_log::AccessLog;
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use http::AppServer;
pub use lifecycle::Shutdown;
