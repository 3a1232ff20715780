//! Fixed-window rate limiting per client IP.
//!
//! Every response passing a limiter carries `RateLimit-Limit`,
//! `RateLimit-Remaining` and `RateLimit-Reset` (seconds). Rejections are a
//! 429 with `Retry-After`. Rejected requests still count toward the window.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{RateLimitConfig, WindowLimit};
use crate::error::ApiError;
use crate::http::request::client_ip;
use crate::observability::metrics;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl Decision {
    /// Whole seconds until the window resets, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        for (name, value) in [
            (RATELIMIT_LIMIT, u64::from(self.limit)),
            (RATELIMIT_REMAINING, u64::from(self.remaining)),
            (RATELIMIT_RESET, self.reset_secs()),
        ] {
            // An inner, stricter limiter has already described itself.
            headers.entry(name).or_insert(HeaderValue::from(value));
        }
    }
}

/// Request counter keyed by client IP.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: &'static str,
    limit: WindowLimit,
    windows: DashMap<IpAddr, Window>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, limit: WindowLimit) -> Self {
        Self {
            name,
            limit,
            windows: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.limit.window_secs)
    }

    pub fn check(&self, key: IpAddr) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: IpAddr, now: Instant) -> Decision {
        let window = self.window();
        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        Decision {
            allowed: entry.count <= self.limit.max_requests,
            limit: self.limit.max_requests,
            remaining: self.limit.max_requests.saturating_sub(entry.count),
            reset_after: window.saturating_sub(now.saturating_duration_since(entry.started)),
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let window = self.window();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Middleware state: one limiter plus how to find the client.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<FixedWindowLimiter>,
    pub trust_proxy: bool,
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request, state.trust_proxy).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let decision = state.limiter.check(key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(
            client = %key,
            limiter = state.limiter.name(),
            limit = decision.limit,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(state.limiter.name());
        ApiError::TooManyRequests {
            retry_after_secs: decision.reset_secs(),
        }
        .into_response()
    };

    decision.write_headers(response.headers_mut());
    response
}

/// The global and strict limiters of one server.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub global: Arc<FixedWindowLimiter>,
    pub strict: Arc<FixedWindowLimiter>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            global: Arc::new(FixedWindowLimiter::new("global", config.global)),
            strict: Arc::new(FixedWindowLimiter::new("strict", config.strict)),
        }
    }

    pub fn state(&self, limiter: &Arc<FixedWindowLimiter>, trust_proxy: bool) -> RateLimitState {
        RateLimitState {
            limiter: limiter.clone(),
            trust_proxy,
        }
    }

    /// Periodically drop expired windows until shutdown.
    pub async fn run_pruner(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.global.prune() + self.strict.prune();
                    if removed > 0 {
                        tracing::debug!(removed, "Pruned expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit pruner received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
