//! Resumable upload subsystem.
//!
//! # Data Flow
//! ```text
//! upload-route request (session-id, x-content-range, content-disposition)
//!     → range.rs (parse "start-end/total")
//!     → tracker.rs (per-session lock held for the whole sequence)
//!         → load sidecar intervals
//!         → interval.rs (append + merge)
//!         → write chunk bytes into the data file at `start`
//!         → persist merged intervals to the sidecar
//!     → completion check
//!         → incomplete: 201 with the received-ranges receipt
//!         → complete: completion notice forwarded upstream
//! ```
//!
//! # Design Decisions
//! - Sidecar file is plain text, one `start-end/total` per line
//! - Chunks of the same session are serialized in-process
//! - Any failure fails the whole chunk; the client resends it unchanged

pub mod interval;
pub mod range;
pub mod tracker;
pub mod types;

pub use interval::{merge, Interval};
pub use range::{parse_range, ContentRange};
pub use tracker::{completion, filename_from_disposition, UploadRecord, UploadTracker};
pub use types::{UploadChunk, UploadError, UploadProgress, UploadResult};
