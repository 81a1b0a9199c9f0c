//! Accept loop.
//!
//! # Responsibilities
//! - Accept connections under the listener's connection limit
//! - Spawn one [`ConnectionHandler`] per connection
//! - On shutdown: stop accepting, then wait (bounded) for open connections

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::buffer::BufferPool;
use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::http::handler::ConnectionHandler;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::upstream::UpstreamError;

/// The gateway's HTTP/1.1 server.
#[derive(Debug)]
pub struct GatewayServer {
    handler: ConnectionHandler,
    pool: Arc<BufferPool>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl GatewayServer {
    /// Server forwarding to the configured upstream.
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        Ok(Self::with_gateway(config, Gateway::from_config(config)?))
    }

    /// Server executing requests through `gateway`.
    pub fn with_gateway(config: &GatewayConfig, gateway: Gateway) -> Self {
        let pool = BufferPool::new(config.buffers.buffer_size, config.buffers.max_buffers);
        let handler = ConnectionHandler::new(
            gateway,
            Arc::clone(&pool),
            config.timeouts.idle(),
            config.timeouts.write(),
            config.queue.capacity,
        );
        Self {
            handler,
            pool,
            tracker: ConnectionTracker::new(),
            drain_timeout: config.timeouts.drain(),
        }
    }

    /// Serve until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        let mut stop = shutdown.subscribe();
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Gateway server starting");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let guard = self.tracker.track();
                        let handler = self.handler.clone();
                        let connection_shutdown = shutdown.subscribe();
                        tokio::spawn(async move {
                            let id = guard.id();
                            tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Connection opened");
                            handler.run(id, stream, connection_shutdown).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(e) => return Err(e),
                },
                _ = recv_stop(&mut stop) => break,
            }
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Shutdown requested, draining connections"
        );
        if !self.tracker.drain(self.drain_timeout).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        self.pool.close();
        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

async fn recv_stop(stop: &mut broadcast::Receiver<()>) {
    let _ = stop.recv().await;
}
