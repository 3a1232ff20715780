//! Request access log.
//!
//! # Data Flow
//! ```text
//! request
//!     → middleware.rs (snapshot method, url, client, headers)
//!     → route handlers
//!     → counting.rs (response body wrapped, bytes counted while streaming)
//!     → body released by the transport
//!     → template.rs + tokens.rs (one formatted line)
//!     → router.rs (status < 400 → out.log, otherwise → error.log)
//!     → sink.rs (single writer task per file)
//!
//! rotation.rs, on a timer:
//!     → ask each sink to truncate itself when over its threshold
//! ```
//!
//! # Design Decisions
//! - Template and token registry are built once and shared via Arc
//! - Logging failures never reach the client; they go to tracing
//! - Truncation runs on the sink's writer task, never beside an append

pub mod counting;
pub mod exchange;
pub mod middleware;
pub mod rotation;
pub mod router;
pub mod sink;
pub mod template;
pub mod tokens;
pub mod user_agent;

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use counting::CountingBody;
pub use exchange::{Exchange, FileStat, TransferState};
pub use middleware::access_log_middleware;
pub use rotation::RotationWatchdog;
pub use router::LogRouter;
pub use sink::{RotationOutcome, Sink, SinkError, SinkKind};
pub use template::{LogFormat, Template};
pub use tokens::TokenRegistry;

use crate::config::AppConfig;
use crate::observability::metrics;

/// Process-wide access log configuration, passed to the middleware as state.
#[derive(Clone)]
pub struct AccessLog {
    inner: Arc<Inner>,
}

struct Inner {
    template: Template,
    registry: TokenRegistry,
    router: LogRouter,
    trust_proxy: bool,
}

impl AccessLog {
    pub fn new(template: Template, registry: TokenRegistry, router: LogRouter) -> Self {
        Self {
            inner: Arc::new(Inner {
                template,
                registry,
                router,
                trust_proxy: false,
            }),
        }
    }

    /// Open the sinks named in `config` and pick the template for its
    /// environment. Returns the sink writer tasks alongside.
    pub fn from_config(config: &AppConfig) -> Result<(Self, Vec<JoinHandle<()>>), SinkError> {
        let (router, tasks) = LogRouter::open(&config.access_log)?;
        let format = LogFormat::for_environment(config.environment);

        let log = Self {
            inner: Arc::new(Inner {
                template: Template::from(format),
                registry: TokenRegistry::with_defaults(),
                router,
                trust_proxy: config.server.trusts_proxy(),
            }),
        };

        tracing::info!(
            format = ?format,
            dir = %config.access_log.dir,
            out = %config.access_log.out_file,
            error = %config.access_log.error_file,
            "Access log enabled"
        );

        Ok((log, tasks))
    }

    pub fn trust_proxy(&self) -> bool {
        self.inner.trust_proxy
    }

    pub fn router(&self) -> &LogRouter {
        &self.inner.router
    }

    pub fn format_line(&self, exchange: &Exchange) -> String {
        self.inner.template.render(&self.inner.registry, exchange)
    }

    /// Format and route one finished exchange.
    pub fn record(&self, exchange: &Exchange) {
        let Some(status) = exchange.status else {
            tracing::debug!(url = %exchange.url, "Exchange ended without a response, not logged");
            return;
        };

        metrics::record_request(exchange.method.as_str(), status.as_u16(), exchange.response_time);

        let line = self.format_line(exchange);
        self.inner.router.dispatch(status, line);
    }
}
