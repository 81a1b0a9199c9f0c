//! Connection handler.
//!
//! # Responsibilities
//! - Own one connection from accept to close
//! - Run the parser task and the request queue side by side
//! - Turn parse failures and idle partial messages into error responses
//! - Tear everything down in order
//!
//! # Data Flow
//! ```text
//! socket read half → ParserTask ──events──▶ handler loop ──▶ RequestQueue
//!                                              │                 │
//!                                          idle timer        execute + write
//!                                                                │
//! socket write half ◀──────────── ConnectionHandle ◀─────────────┘
//! ```
//!
//! # Design Decisions
//! - The idle timer restarts on every loop iteration
//! - Teardown drains the queue before shutting the socket down, so the final
//!   400 or 408 always reaches the client

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::buffer::BufferPool;
use crate::gateway::Gateway;
use crate::http::parser::{ParserEvent, ParserTask};
use crate::http::queue::RequestQueue;
use crate::http::request::{Request, RequestOk};
use crate::net::ConnectionHandle;

/// Why the handler loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side or the read failed.
    PeerClosed,
    /// The stream was unparseable; a 400 was queued.
    BadRequest,
    /// Idle with a partial message buffered; a 408 was queued.
    Timeout,
    /// Idle with nothing buffered and nothing in flight.
    Idle,
    /// Process shutdown.
    Shutdown,
    /// No read buffer could be obtained.
    NoBuffer,
}

/// Per-connection settings and shared state.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    gateway: Gateway,
    pool: Arc<BufferPool>,
    idle_timeout: Duration,
    write_timeout: Duration,
    queue_capacity: usize,
}

impl ConnectionHandler {
    pub fn new(
        gateway: Gateway,
        pool: Arc<BufferPool>,
        idle_timeout: Duration,
        write_timeout: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self {
            gateway,
            pool,
            idle_timeout,
            write_timeout,
            queue_capacity,
        }
    }

    /// Serve `stream` until it closes, fails to parse, idles out or the
    /// process shuts down.
    pub async fn run<S>(&self, id: Uuid, stream: S, mut shutdown: broadcast::Receiver<()>) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let connection = ConnectionHandle::new(id, writer);

        let acquired = tokio::select! {
            acquired = self.pool.acquire() => acquired,
            _ = shutdown.recv() => {
                tracing::debug!(connection_id = %id, "Shutdown while waiting for a read buffer");
                close(&connection).await;
                return CloseReason::Shutdown;
            }
        };
        let buffer = match acquired {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!(connection_id = %id, error = %e, "No read buffer for connection");
                close(&connection).await;
                return CloseReason::NoBuffer;
            }
        };

        let (events_tx, mut events) = mpsc::channel(1);
        let unparsed = Arc::new(AtomicUsize::new(0));
        let parser = tokio::spawn(
            ParserTask::new(id, reader, buffer, events_tx, Arc::clone(&unparsed)).run(),
        );
        let queue = RequestQueue::spawn(self.gateway.clone(), self.queue_capacity, self.write_timeout);

        tracing::debug!(connection_id = %id, "Connection handler started");

        let reason = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ParserEvent::Parsed(parsed)) => {
                        let request = RequestOk::from_parsed(parsed, connection.clone());
                        tracing::debug!(
                            connection_id = %id,
                            request_id = %request.id,
                            method = %request.method,
                            path = %request.path,
                            "Request queued"
                        );
                        if queue.push(Request::Parsed(request)).await.is_err() {
                            break CloseReason::PeerClosed;
                        }
                    }
                    Some(ParserEvent::Failed(err)) => {
                        let request = Request::bad_request(connection.clone());
                        tracing::info!(
                            connection_id = %id,
                            request_id = %request.id(),
                            error = %err,
                            "Rejecting unparseable request"
                        );
                        let _ = queue.push(request).await;
                        break CloseReason::BadRequest;
                    }
                    None => break CloseReason::PeerClosed,
                },
                _ = tokio::time::sleep(self.idle_timeout) => {
                    let buffered = unparsed.load(Ordering::Acquire);
                    if buffered > 0 {
                        let request = Request::timeout(connection.clone());
                        tracing::info!(
                            connection_id = %id,
                            request_id = %request.id(),
                            buffered,
                            "Idle with partial request"
                        );
                        let _ = queue.push(request).await;
                        break CloseReason::Timeout;
                    }
                    if queue.is_drained() {
                        break CloseReason::Idle;
                    }
                },
                _ = shutdown.recv() => break CloseReason::Shutdown,
            }
        };

        queue.close().await;
        parser.abort();
        let _ = parser.await;
        close(&connection).await;

        tracing::debug!(connection_id = %id, reason = ?reason, "Connection closed");
        reason
    }
}

async fn close(connection: &ConnectionHandle) {
    if let Err(e) = connection.close().await {
        tracing::debug!(connection_id = %connection.id(), error = %e, "Shutdown of write side failed");
    }
}
