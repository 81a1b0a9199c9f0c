//! Upload gateway
//!
//! An HTTP/1.1 front end that proxies requests to one fixed upstream and
//! assembles resumable chunked uploads on local disk.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    UPLOAD GATEWAY                    │
//!                        │                                                      │
//!   Client bytes         │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ─────────────────────┼─▶│   net    │──▶│  parser  │──▶│  request queue   │  │
//!                        │  │ listener │   │   task   │   │  (FIFO worker)   │  │
//!                        │  └──────────┘   └──────────┘   └────────┬─────────┘  │
//!                        │                                          │            │
//!                        │                          ┌───────────────┴──────┐     │
//!                        │                          ▼                      ▼     │
//!                        │                  ┌──────────────┐     ┌────────────┐ │
//!                        │                  │    upload    │────▶│  upstream  │─┼──▶ Upstream
//!                        │                  │   tracker    │     │ forwarder  │ │
//!                        │                  └──────────────┘     └────────────┘ │
//!   Client response      │  ┌──────────┐                                         │
//!   ◀────────────────────┼──│ response │◀── written back in request order        │
//!                        │  │ encoder  │                                         │
//!                        │  └──────────┘                                         │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use upload_gateway::cli::Cli;
use upload_gateway::lifecycle::signals::wait_for_signal;
use upload_gateway::net::Listener;
use upload_gateway::observability::{logging, metrics};
use upload_gateway::{GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    logging::init_logging(&config.observability.log_level)?;
    tracing::info!("upload-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        data_dir = %config.upload.data_dir.display(),
        idle_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = GatewayServer::new(&config)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
