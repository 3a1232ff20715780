//! Read-only snapshot of one request/response exchange.

use std::net::IpAddr;
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode, Version};

/// Size of a file served from disk, attached to a response's extensions by
/// handlers that stream files without a `Content-Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// How far the response got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No response head was produced.
    NoResponse,
    /// Head and the full body were handed to the transport.
    Complete,
    /// Head was sent but the body stopped early.
    Partial,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::NoResponse => "NO_RESPONSE",
            TransferState::Complete => "COMPLETE",
            TransferState::Partial => "PARTIAL",
        }
    }
}

/// Everything the log tokens may read about an exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: Method,
    /// Original request target (path and query).
    pub url: String,
    pub version: Version,
    /// Client address, after proxy header handling.
    pub remote_addr: Option<IpAddr>,
    pub request_headers: HeaderMap,
    /// Final status; `None` while no head exists.
    pub status: Option<StatusCode>,
    pub response_headers: HeaderMap,
    pub file_stat: Option<FileStat>,
    /// Body bytes counted while streaming; `None` when nothing was written.
    pub captured_bytes: Option<u64>,
    /// The body had no known length, so it went out chunked.
    pub chunked: bool,
    pub state: TransferState,
    pub response_time: Duration,
}

impl Exchange {
    /// A request that has not produced a response yet.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            version: Version::HTTP_11,
            remote_addr: None,
            request_headers: HeaderMap::new(),
            status: None,
            response_headers: HeaderMap::new(),
            file_stat: None,
            captured_bytes: None,
            chunked: false,
            state: TransferState::NoResponse,
            response_time: Duration::ZERO,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.request_headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }
}
