//! Per-connection request queue.
//!
//! # Responsibilities
//! - Accept requests in arrival order into a bounded mailbox
//! - Execute them one at a time on a single worker
//! - Write each response back before starting the next request
//!
//! # Design Decisions
//! - One worker per connection: responses are never reordered or interleaved
//! - A failed or timed-out write drops that response; it is logged, not retried
//! - `close` waits for the worker so every accepted request gets its response

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::gateway::Gateway;
use crate::http::request::Request;
use crate::observability::metrics;

#[derive(Debug, Error)]
#[error("request queue closed")]
pub struct QueueClosed;

/// FIFO mailbox drained by one worker task.
#[derive(Debug)]
pub struct RequestQueue {
    sender: mpsc::Sender<Request>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl RequestQueue {
    /// Start the worker.
    pub fn spawn(gateway: Gateway, capacity: usize, write_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(work(gateway, receiver, Arc::clone(&pending), write_timeout));
        Self {
            sender,
            pending,
            worker,
        }
    }

    /// Enqueue a request, waiting while the mailbox is full.
    pub async fn push(&self, request: Request) -> Result<(), QueueClosed> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(request).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueClosed);
        }
        Ok(())
    }

    /// True when nothing is queued or executing.
    pub fn is_drained(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    /// Stop accepting requests and wait until every queued one is answered.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Queue worker panicked");
        }
    }
}

async fn work(
    gateway: Gateway,
    mut receiver: mpsc::Receiver<Request>,
    pending: Arc<AtomicUsize>,
    write_timeout: Duration,
) {
    while let Some(request) = receiver.recv().await {
        let start = Instant::now();
        let response = request.execute(&gateway).await;
        let connection = request.connection();

        match tokio::time::timeout(write_timeout, connection.write_all(&response.encode())).await {
            Ok(Ok(())) => tracing::debug!(
                request_id = %request.id(),
                connection_id = %connection.id(),
                status = response.code,
                "Response written"
            ),
            Ok(Err(e)) => tracing::warn!(
                request_id = %request.id(),
                connection_id = %connection.id(),
                error = %e,
                "Response write failed"
            ),
            Err(_) => tracing::warn!(
                request_id = %request.id(),
                connection_id = %connection.id(),
                timeout = ?write_timeout,
                "Response write timed out"
            ),
        }

        metrics::record_request(request.method_label(), response.code, start);
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}
