//! Security response headers.
//!
//! # Responsibilities
//! - `X-Frame-Options` (configurable, default `SAMEORIGIN`)
//! - `X-XSS-Protection: 1; mode=block`
//!
//! Headers a handler already set are left alone.

use axum::http::{header, HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::schema::SecurityConfig;

pub const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");

/// Layers to apply, empty when security headers are disabled.
pub fn security_header_layers(config: &SecurityConfig) -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    if !config.enable_headers {
        return Vec::new();
    }

    let frame_options = HeaderValue::from_str(&config.frame_options).unwrap_or_else(|_| {
        tracing::warn!(value = %config.frame_options, "Invalid X-Frame-Options value, using SAMEORIGIN");
        HeaderValue::from_static("SAMEORIGIN")
    });

    vec![
        SetResponseHeaderLayer::if_not_present(header::X_FRAME_OPTIONS, frame_options),
        SetResponseHeaderLayer::if_not_present(
            X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ),
    ]
}
