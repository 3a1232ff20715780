//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every route
//! - Wire up middleware (request ID, compression, access log, security
//!   headers, rate limits, panic boundary, timeout)
//! - Serve `public/` with a long-lived `Cache-Control`
//! - Serve on a listener until shutdown, then drain background tasks and
//!   the access log sinks
//!
//! # Layer order (outermost first)
//! ```text
//! request-id → compression → access log → security headers
//!     → global rate limit → catch-panic → timeout → routes
//! ```
//! The access log sits inside compression so `bytes-sent` counts the
//! uncompressed body, and outside everything that can short-circuit so
//! rejected, panicked and timed-out requests are still logged.

use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    BoxError, Json, Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
};

use crate::access_log::{access_log_middleware, AccessLog, RotationWatchdog, SinkError};
use crate::auth::{handlers as auth, TokenIssuer};
use crate::config::AppConfig;
use crate::db::{handlers as db, Database, DbError};
use crate::error::ApiError;
use crate::http::files;
use crate::http::request::MakeRequestUuid;
use crate::http::response::ApiResponse;
use crate::lifecycle::Shutdown;
use crate::security::{rate_limit_middleware, security_header_layers, RateLimitState, RateLimiters};
use crate::upload::{handlers as upload, UploadStore};

/// How often expired rate-limit windows are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on waiting for sink writers to drain at shutdown.
const SINK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One year, for files under the public directory.
pub const STATIC_CACHE_CONTROL: &str = "public, max-age=31557600";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to open access log: {0}")]
    AccessLog(#[from] SinkError),

    #[error("database setup failed: {0}")]
    Database(#[from] DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub issuer: Arc<TokenIssuer>,
    pub uploads: Arc<UploadStore>,
    pub public_dir: Arc<PathBuf>,
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, database: Option<Database>) -> Self {
        Self {
            issuer: Arc::new(TokenIssuer::from_config(&config.auth)),
            uploads: Arc::new(UploadStore::from_config(&config.upload)),
            public_dir: Arc::new(PathBuf::from(&config.server.public_dir)),
            database,
            config,
        }
    }
}

/// The application server: router plus the background pieces it owns.
pub struct AppServer {
    router: Router,
    config: Arc<AppConfig>,
    access_log: Option<AccessLog>,
    sink_tasks: Vec<JoinHandle<()>>,
    limiters: Option<RateLimiters>,
    database: Option<Database>,
}

impl AppServer {
    /// Open the access log sinks and build the router.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let config = Arc::new(config);

        let (access_log, sink_tasks) = if config.access_log.enabled {
            let (log, tasks) = AccessLog::from_config(&config)?;
            (Some(log), tasks)
        } else {
            tracing::info!("Access log disabled");
            (None, Vec::new())
        };

        let limiters = config
            .rate_limit
            .enabled
            .then(|| RateLimiters::from_config(&config.rate_limit));

        let database = Database::from_config(&config.database)?;
        if database.is_none() {
            tracing::info!("No database configured, GET /test will fail");
        }

        let state = AppState::new(config.clone(), database.clone());
        let router = Self::build_router(&config, state, access_log.clone(), limiters.as_ref());

        Ok(Self {
            router,
            config,
            access_log,
            sink_tasks,
            limiters,
            database,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &AppConfig,
        state: AppState,
        access_log: Option<AccessLog>,
        limiters: Option<&RateLimiters>,
    ) -> Router {
        let trust_proxy = config.server.trusts_proxy();
        let strict = limiters.map(|l| l.state(&l.strict, trust_proxy));
        let body_limit = DefaultBodyLimit::max(config.upload.max_request_size());

        let static_files: Router = Router::new()
            .fallback_service(
                ServeDir::new(&config.server.public_dir)
                    .not_found_service(files::not_found.into_service()),
            )
            .layer(middleware::map_response(cache_static));

        let timeout = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )));

        let mut router = Router::new()
            .route("/health", get(health))
            .route("/test", get(db::list_rows).post(post_test))
            .route("/auth", post(auth::post_auth))
            .route("/auth/getToken", with_limit(post(auth::get_token), &strict))
            .route("/auth/verify", get(auth::verify))
            .route(
                "/upload",
                with_limit(post(upload::upload_single).layer(body_limit), &strict),
            )
            .route(
                "/upload/multiple",
                with_limit(post(upload::upload_multiple).layer(body_limit), &strict),
            )
            .route(
                "/upload/mix",
                with_limit(post(upload::upload_mix).layer(body_limit), &strict),
            )
            .route("/download/{*path}", get(files::download))
            .fallback_service(static_files)
            .with_state(state)
            .layer(timeout)
            .layer(CatchPanicLayer::custom(handle_panic));

        if let Some(limiters) = limiters {
            router = router.layer(middleware::from_fn_with_state(
                limiters.state(&limiters.global, trust_proxy),
                rate_limit_middleware,
            ));
        }

        for layer in security_header_layers(&config.security) {
            router = router.layer(layer);
        }

        if let Some(log) = access_log {
            router = router.layer(middleware::from_fn_with_state(log, access_log_middleware));
        }

        router
            .layer(CompressionLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn access_log(&self) -> Option<&AccessLog> {
        self.access_log.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then stop background tasks and wait
    /// for the access log sinks to drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut background = Vec::new();

        if let Some(log) = &self.access_log {
            let watchdog = RotationWatchdog::from_config(log.router(), &self.config.access_log);
            if !watchdog.is_empty() {
                background.push(tokio::spawn(watchdog.run(shutdown.subscribe())));
            }
        }

        if let Some(limiters) = self.limiters.clone() {
            background.push(tokio::spawn(limiters.run_pruner(PRUNE_INTERVAL, shutdown.subscribe())));
        }

        let AppServer {
            router,
            access_log,
            sink_tasks,
            database,
            ..
        } = self;

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let signal = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.wait().await })
            .await;

        shutdown.trigger();
        for task in background {
            let _ = task.await;
        }
        if let Some(database) = database {
            database.close().await;
        }

        // The sink writers exit once every handle to them is gone.
        drop(access_log);
        for task in sink_tasks {
            if tokio::time::timeout(SINK_DRAIN_TIMEOUT, task).await.is_err() {
                tracing::warn!("Access log sink did not drain before the deadline");
            }
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn with_limit<S>(route: MethodRouter<S>, limit: &Option<RateLimitState>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    match limit {
        Some(state) => route.layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        )),
        None => route,
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /test
async fn post_test() -> ApiResponse<&'static str> {
    ApiResponse::success("post")
}

async fn handle_timeout(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::Timeout
    } else {
        ApiError::Internal(format!("Unhandled internal error: {}", err))
    }
}

/// Successful static responses may be cached by clients.
async fn cache_static(mut response: Response) -> Response {
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        response
            .headers_mut()
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(STATIC_CACHE_CONTROL));
    }
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal("Internal Server Error".to_string()).into_response()
}
