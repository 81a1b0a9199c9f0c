//! Upload request/outcome types and error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that fail an upload chunk. All of them surface as `500`.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A required upload header was absent.
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    /// `content-disposition` carried no filename.
    #[error("content-disposition has no filename")]
    MissingFilename,

    /// Session id is empty or not usable as a file name.
    #[error("invalid session id {0:?}")]
    InvalidSession(String),

    /// Range value did not match `start-end/total`.
    #[error("malformed content range {0:?}")]
    MalformedRange(String),

    /// Range parsed but is inconsistent with itself or with the chunk body.
    #[error("invalid content range {range}: {reason}")]
    InvalidRange { range: String, reason: &'static str },

    /// Reading or writing the data or sidecar file failed.
    #[error("upload I/O failed on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// One chunk of a resumable upload, as extracted from a parsed request.
#[derive(Debug, Clone)]
pub struct UploadChunk {
    /// Client-chosen session identifier (upload key).
    pub session_id: String,
    /// Raw `x-content-range` value.
    pub content_range: String,
    /// Declared filename from `content-disposition`.
    pub filename: String,
    /// Chunk payload.
    pub body: Vec<u8>,
}

/// What happened after a chunk was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    /// More ranges are missing. `receipt` lists the merged ranges received so far.
    Partial { receipt: String },
    /// Every byte of the file has been received.
    Complete { filename: String, data_path: PathBuf },
}
