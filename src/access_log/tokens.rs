//! Log tokens: named pure functions over an [`Exchange`].
//!
//! A token yields `None` when it has nothing to report; the template then
//! prints `-` in its place.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode, Version};
use chrono::{Local, NaiveDateTime};

use super::exchange::Exchange;
use super::user_agent;

/// Signature shared by all tokens. The second argument is the optional
/// bracketed parameter, e.g. `0` in `:response-time[0]`.
pub type TokenFn = Arc<dyn Fn(&Exchange, Option<&str>) -> Option<String> + Send + Sync>;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Headers consulted by `bytes-sent`, in preference order. Compression
/// layers drop or rewrite `Content-Length`, so the uncompressed size
/// headers win.
const LENGTH_HEADERS: [&str; 3] = [
    "x-original-content-length",
    "x-content-length",
    "content-length",
];

/// Token name → function table, built once at startup.
#[derive(Clone)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenFn>,
}

impl TokenRegistry {
    /// A registry with no tokens at all.
    pub fn empty() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// The built-in tokens used by both log templates.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register("method", |ex, _| Some(ex.method.to_string()));
        registry.register("url", |ex, _| Some(ex.url.clone()));
        registry.register("status", |ex, _| ex.status.map(|s| s.as_u16().to_string()));
        registry.register("colored-status", |ex, _| ex.status.map(colored_status));
        registry.register("response-time", |ex, arg| {
            ex.status?;
            let digits = arg.and_then(|d| d.parse::<usize>().ok()).unwrap_or(3);
            let millis = ex.response_time.as_secs_f64() * 1000.0;
            Some(format!("{:.*}", digits, millis))
        });
        registry.register("short-date", |_, _| Some(short_date(Local::now().naive_local())));
        registry.register("parsed-user-agent", |ex, _| {
            Some(user_agent::describe(ex.user_agent()))
        });
        registry.register("bytes-sent", |ex, _| Some(bytes_sent(ex)));
        registry.register("transfer-state", |ex, _| Some(ex.state.as_str().to_string()));
        registry.register("remote-addr", |ex, _| ex.remote_addr.map(|ip| ip.to_string()));
        registry.register("http-version", |ex, _| Some(http_version(ex.version).to_string()));
        registry.register("user-agent", |ex, _| ex.user_agent().map(str::to_string));
        registry.register("req", |ex, arg| header_value(&ex.request_headers, arg?));
        registry.register("res", |ex, arg| {
            ex.status?;
            header_value(&ex.response_headers, arg?)
        });

        registry
    }

    /// Add or replace a token.
    pub fn register<F>(&mut self, name: &str, token: F)
    where
        F: Fn(&Exchange, Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        self.tokens.insert(name.to_string(), Arc::new(token));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tokens.contains_key(name)
    }

    /// Evaluate a token; unknown tokens and empty results render as `-`.
    pub fn evaluate(&self, name: &str, exchange: &Exchange, arg: Option<&str>) -> String {
        self.tokens
            .get(name)
            .and_then(|token| token(exchange, arg))
            .unwrap_or_else(|| "-".to_string())
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tokens.keys().collect();
        names.sort();
        f.debug_struct("TokenRegistry").field("tokens", &names).finish()
    }
}

/// Status code wrapped in an ANSI color by class.
pub fn colored_status(status: StatusCode) -> String {
    let code = status.as_u16();
    let color = if code >= 500 {
        RED
    } else if code >= 400 {
        YELLOW
    } else if code >= 300 {
        CYAN
    } else {
        GREEN
    };
    format!("{}{}{}", color, code, RESET)
}

/// `YYYY-MM-DD HH:MM:SS`, no offset.
pub fn short_date(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Size of the response body in kilobytes.
///
/// Explicit length headers win over static file metadata, which wins over
/// the byte count captured while streaming. Without any of those a chunked
/// response reports `chunked`, anything else `-`.
pub fn bytes_sent(exchange: &Exchange) -> String {
    let from_headers = LENGTH_HEADERS.iter().find_map(|name| {
        exchange
            .response_headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    });

    let length = from_headers
        .or_else(|| exchange.file_stat.map(|stat| stat.size))
        .or(exchange.captured_bytes);

    if let Some(length) = length {
        return format!("{:.2}KB", length as f64 / 1024.0);
    }

    let chunked_header = exchange
        .response_headers
        .get(header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    if exchange.chunked || chunked_header {
        return "chunked".to_string();
    }

    "-".to_string()
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "-",
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}
