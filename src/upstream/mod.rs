//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! parsed request / upload completion
//!     → forwarder.rs (build ForwardRequest, pick body or form payload)
//!     → Forward implementation (reqwest client, fixed upstream base URL)
//!         → on transport error: backoff.rs delay, retry up to max_attempts
//!     → relay(): 200 → status + body verbatim, anything else → 502
//! ```
//!
//! # Design Decisions
//! - One fixed upstream; no routing or load balancing
//! - Only transport failures are retried; an upstream status is final
//! - `Forward` is a trait so the gateway can be driven against a fake upstream

pub mod backoff;
pub mod forwarder;

pub use backoff::RetryPolicy;
pub use forwarder::{
    relay, Forward, ForwardFuture, ForwardRequest, Payload, UpstreamError, UpstreamForwarder,
    UpstreamReply,
};
