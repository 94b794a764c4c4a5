//! Query gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  QUERY GATEWAY                   │
//!                      │                                                  │
//!   Client Request     │  ┌──────────┐   ┌───────────┐   ┌────────────┐  │
//!   ───────────────────┼─▶│ identity │──▶│ rate limit│──▶│   cache    │  │
//!                      │  │ resolver │   │  (sliding │   │ (LRU+TTL,  │  │
//!                      │  └──────────┘   │  windows) │   │ per tenant)│  │
//!                      │                 └─────┬─────┘   └─────┬──────┘  │
//!                      │                   429 │          miss │         │
//!   Client Response    │                       ▼               ▼         │
//!   ◀──────────────────┼─────────────────── response ◀── answer service ─┼──▶ Upstream
//!                      │                                                  │
//!                      │  admin API: status / cache / limiter / invalidate│
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use query_gateway::config::loader::{default_config, load_config};
use query_gateway::lifecycle::{signals, Shutdown};
use query_gateway::observability::{logging, metrics};
use query_gateway::pipeline::UpstreamAnswerService;
use query_gateway::{admin, HttpServer};

#[derive(Parser)]
#[command(name = "gateway", version, about = "Multi-tenant query gateway")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        requests_per_minute = config.rate_limit.requests_per_minute,
        requests_per_hour = config.rate_limit.requests_per_hour,
        burst_limit = config.rate_limit.burst_limit,
        cache_max_size = config.cache.max_size,
        cache_ttl_seconds = config.cache.ttl_seconds,
        trusted_proxies = %config.proxy.trusted_proxies,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let answers = Arc::new(UpstreamAnswerService::new(&config.answer)?);
    let server = HttpServer::new(config.clone(), answers);
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin_router = server.admin_router();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_listener, admin_router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_termination().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
