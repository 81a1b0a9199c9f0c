//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, shared write half, lifecycle tracking)
//!     → Hand off to the connection handler
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The write half is shared behind a mutex; only the queue worker and
//!   teardown ever touch it

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionHandle, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
