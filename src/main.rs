//! Task API server (v1)
//!
//! A multi-user task tracking API built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id / trace / timeout / body limit
//!                          │
//!                          ▼
//!                    ┌─────────────┐   429 + Retry-After
//!                    │ rate limiter│──────────────────────▶
//!                    └──────┬──────┘
//!                           │ /api/tasks*
//!                           ▼
//!                    ┌─────────────┐   401 {"error": ...}
//!                    │ access gate │──────────────────────▶
//!                    └──────┬──────┘
//!                           ▼
//!                    ┌─────────────┐      ┌──────────────┐
//!                    │  handlers   │─────▶│ SQLite store │
//!                    └─────────────┘      └──────────────┘
//!
//!     Background: bucket sweeper (idle eviction), stops on shutdown
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use task_api::config::load_config;
use task_api::lifecycle::{signals, Shutdown};
use task_api::observability::{logging, metrics};
use task_api::store::{bootstrap_admin, SqliteStore};
use task_api::HttpServer;

#[derive(Parser)]
#[command(name = "task-api")]
#[command(about = "Multi-user task tracking API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_tracing(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "task-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.database.path,
        rate_limit_enabled = config.rate_limit.enabled,
        requests_per_second = config.rate_limit.requests_per_second,
        burst_size = config.rate_limit.burst_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let store = Arc::new(SqliteStore::open(&config.database.path)?);
    bootstrap_admin(&store, &config.bootstrap, config.auth.bcrypt_cost)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::forward_signals(shutdown.clone());

    let server = HttpServer::new(config, store);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
