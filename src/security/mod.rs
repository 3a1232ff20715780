//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (global per-IP window; strict window on sensitive routes)
//!     → handlers
//!     → headers.rs (X-Frame-Options, X-XSS-Protection on the way out)
//! ```
//!
//! # Design Decisions
//! - Forwarded headers are trusted only when the server sits behind a proxy
//! - Rejections use the same JSON error body as every other API error

pub mod headers;
pub mod rate_limit;

pub use headers::security_header_layers;
pub use rate_limit::{rate_limit_middleware, FixedWindowLimiter, RateLimitState, RateLimiters};
