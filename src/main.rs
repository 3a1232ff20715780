//! starter-backend
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                  STARTER BACKEND                   │
//!                  │                                                    │
//!   Client ───────▶│  request-id → compression → access log → limits    │
//!                  │        → routes (auth, upload, download, static)   │
//!                  │                         │                          │
//!   Client ◀───────│  counting body ◀────────┘                          │
//!                  │        │                                           │
//!                  │        ▼ (body released)                           │
//!                  │  template → router → out.log / error.log           │
//!                  │                           ▲                        │
//!                  │  rotation watchdog ───────┘ (timer, truncate)      │
//!                  └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use starter_backend::config::load_from_env;
use starter_backend::lifecycle::{spawn_signal_handler, startup, Shutdown};
use starter_backend::observability::{logging, metrics};
use starter_backend::AppServer;

#[derive(Parser, Debug)]
#[command(name = "starter-backend", version, about = "Starter HTTP backend with request access logging")]
struct Args {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Dotenv file loaded before environment overrides are read
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let env_loaded = dotenvy::from_path(&args.env_file).is_ok();
    let config = load_from_env(Some(&args.config))?;

    logging::init_tracing(&config);
    tracing::info!("starter-backend v{} starting", env!("CARGO_PKG_VERSION"));
    if env_loaded {
        tracing::info!(path = %args.env_file.display(), "Loaded environment file");
    }

    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.server.bind_address,
        base_url = %config.server.base_url,
        trust_proxy = config.server.trusts_proxy(),
        out_max_bytes = ?config.access_log.out_max_bytes,
        error_max_bytes = ?config.access_log.error_max_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    startup::prepare_directories(&config)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let local_addr = listener.local_addr()?;
    startup::check_base_url(&config.server.base_url, local_addr);
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = AppServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
