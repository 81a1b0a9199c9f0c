//! Bounded pool of fixed-size byte buffers.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Default buffer size: one read buffer per connection.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Errors returned when a buffer cannot be handed out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Every buffer is checked out.
    #[error("buffer pool exhausted: all {0} buffers in use")]
    Exhausted(usize),

    /// The pool has been closed.
    #[error("buffer pool closed")]
    Closed,
}

/// A bounded, thread-safe pool of equally sized byte buffers.
///
/// At most `max_buffers` buffers are outstanding at once. [`BufferPool::acquire`]
/// waits for a release when the pool is exhausted.
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    max_buffers: usize,
    free: Mutex<Vec<Box<[u8]>>>,
    permits: Arc<Semaphore>,
}

impl BufferPool {
    /// Create a pool handing out buffers of `buffer_size` bytes, at most
    /// `max_buffers` at a time.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Arc<Self> {
        Arc::new(Self {
            buffer_size,
            max_buffers,
            free: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_buffers)),
        })
    }

    /// Acquire a buffer, waiting until one is released if the pool is exhausted.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledBuffer, PoolError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(self.checkout(permit))
    }

    /// Acquire a buffer without waiting.
    pub fn try_acquire(self: &Arc<Self>) -> Result<PooledBuffer, PoolError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => PoolError::Exhausted(self.max_buffers),
                TryAcquireError::Closed => PoolError::Closed,
            })?;
        Ok(self.checkout(permit))
    }

    /// Stop handing out buffers. Pending `acquire` calls fail with [`PoolError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }

    /// Size in bytes of every buffer in this pool.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers that can still be checked out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Number of released buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn checkout(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> PooledBuffer {
        let data = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());

        PooledBuffer {
            data: Some(data),
            pool: Arc::clone(self),
            _permit: permit,
        }
    }

    fn release(&self, data: Box<[u8]>) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data);
    }
}

/// A buffer checked out of a [`BufferPool`].
///
/// Returned to the pool when dropped. Contents are not cleared between uses.
pub struct PooledBuffer {
    data: Option<Box<[u8]>>,
    pool: Arc<BufferPool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}
