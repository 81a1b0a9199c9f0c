//! Buffer management subsystem.
//!
//! # Data Flow
//! ```text
//! connection accepted
//!     → pool.rs (acquire a fixed-size read buffer, waits when exhausted)
//!     → http parser reads into it for the connection's lifetime
//!     → buffer dropped → storage returned to the free list
//! ```
//!
//! # Design Decisions
//! - The pool is an owned value shared via Arc, never a process global
//! - Outstanding buffers are capped by a semaphore (backpressure, not growth)
//! - Storage is recycled, so steady-state operation does not allocate

pub mod pool;

pub use pool::{BufferPool, PoolError, PooledBuffer};
