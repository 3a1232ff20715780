//! Access log middleware.
//!
//! Snapshots the request, lets the inner service produce a response, then
//! wraps the body in a [`CountingBody`]. The line is formatted and routed
//! only when the transport releases the body, i.e. after the exchange is
//! over. A request whose handler is cancelled before producing a response
//! never reaches that point and is not logged.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use http_body::Body as HttpBody;

use super::counting::{BodyOutcome, CountingBody};
use super::exchange::{Exchange, FileStat, TransferState};
use super::AccessLog;
use crate::http::request::client_ip;

pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let mut exchange = Exchange::new(request.method().clone(), url);
    exchange.version = request.version();
    exchange.remote_addr = client_ip(&request, log.trust_proxy());
    exchange.request_headers = request.headers().clone();

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    exchange.status = Some(parts.status);
    exchange.response_headers = parts.headers.clone();
    exchange.file_stat = parts.extensions.get::<FileStat>().copied();
    exchange.chunked = body.size_hint().exact().is_none();
    exchange.response_time = started.elapsed();

    // HEAD responses never stream their body.
    let bodyless = exchange.method == Method::HEAD;

    let body = CountingBody::new(body, move |outcome, captured| {
        exchange.captured_bytes = captured;
        exchange.state = match outcome {
            BodyOutcome::Complete => TransferState::Complete,
            BodyOutcome::Aborted if bodyless => TransferState::Complete,
            BodyOutcome::Aborted => TransferState::Partial,
        };
        log.record(&exchange);
    });

    Response::from_parts(parts, Body::new(body))
}
