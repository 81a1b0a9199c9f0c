//! Upload state tracking.
//!
//! # Responsibilities
//! - Load and persist the sidecar record of received ranges
//! - Write chunk bytes at their offset in the data file
//! - Decide completion and produce the progress receipt
//! - Serialize concurrent chunks of one session

use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::upload::range::{parse_range, ContentRange};
use crate::upload::types::{UploadChunk, UploadError, UploadProgress, UploadResult};
use crate::upload::{merge, Interval};

const STATE_SUFFIX: &str = ".state";

/// Contents of a session's sidecar file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRecord {
    /// Merged intervals received so far.
    pub intervals: Vec<Interval>,
    /// Declared file size, once any chunk has been recorded.
    pub total: Option<u64>,
}

/// Tracks resumable uploads stored under one data directory.
///
/// Cheap to clone; clones share the session lock table.
#[derive(Debug, Clone)]
pub struct UploadTracker {
    data_dir: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UploadTracker {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Path of the file receiving the session's bytes.
    pub fn data_path(&self, session: &str) -> PathBuf {
        self.data_dir.join(session)
    }

    /// Path of the session's sidecar state file.
    pub fn state_path(&self, session: &str) -> PathBuf {
        self.data_dir.join(format!("{session}{STATE_SUFFIX}"))
    }

    /// Record one chunk and report whether the upload is now complete.
    ///
    /// The load → merge → write → persist sequence runs under the session's
    /// lock, so concurrent chunks of one session cannot lose each other's ranges.
    pub async fn accept_chunk(&self, chunk: &UploadChunk) -> UploadResult<UploadProgress> {
        validate_session(&chunk.session_id)?;
        let range = parse_range(&chunk.content_range)?;
        range.validate(chunk.body.len())?;

        let session = chunk.session_id.as_str();
        let lock = self.session_lock(session);
        let outcome = {
            let _guard = lock.lock().await;
            self.record(chunk, range).await
        };
        self.release_lock(session, lock);

        let progress = outcome?;
        metrics::record_upload_chunk(match progress {
            UploadProgress::Complete { .. } => "complete",
            UploadProgress::Partial { .. } => "partial",
        });
        Ok(progress)
    }

    async fn record(&self, chunk: &UploadChunk, range: ContentRange) -> UploadResult<UploadProgress> {
        let session = chunk.session_id.as_str();

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| UploadError::Io {
                path: self.data_dir.clone(),
                source,
            })?;

        let UploadRecord { mut intervals, total } = self.load(session).await?;
        if total.is_some_and(|total| total != range.total) {
            return Err(UploadError::InvalidRange {
                range: range.to_string(),
                reason: "total differs from record",
            });
        }
        intervals.push(range.interval());
        let intervals = merge(intervals);

        // Data lands before the record so a failed write is never
        // recorded as received.
        self.write(session, &chunk.body, range.start).await?;
        self.persist(session, &intervals, range.total).await?;

        let (complete, receipt) = completion(&intervals, range.total);
        tracing::debug!(
            session_id = %session,
            range = %range,
            receipt = %receipt,
            complete,
            "Upload chunk recorded"
        );

        Ok(if complete {
            UploadProgress::Complete {
                filename: chunk.filename.clone(),
                data_path: self.data_path(session),
            }
        } else {
            UploadProgress::Partial { receipt }
        })
    }

    /// Read the session's sidecar; empty when nothing was received yet.
    pub async fn load(&self, session: &str) -> UploadResult<UploadRecord> {
        let path = self.state_path(session);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(UploadRecord::default()),
            Err(source) => return Err(UploadError::Io { path, source }),
        };

        let mut record = UploadRecord::default();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            let range = parse_range(line)?;
            record.total.get_or_insert(range.total);
            record.intervals.push(range.interval());
        }
        Ok(record)
    }

    /// Overwrite the sidecar with `intervals`, one `start-end/total` per line.
    pub async fn persist(&self, session: &str, intervals: &[Interval], total: u64) -> UploadResult<()> {
        let path = self.state_path(session);
        let content = render(intervals, total, "\n");
        fs::write(&path, content)
            .await
            .map_err(|source| UploadError::Io { path, source })
    }

    /// Write `bytes` into the data file at offset `start`.
    ///
    /// The file is never truncated; unwritten gaps stay sparse.
    pub async fn write(&self, session: &str, bytes: &[u8], start: u64) -> UploadResult<()> {
        let path = self.data_path(session);
        let io_err = |source| UploadError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    fn session_lock(&self, session: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(session.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    fn release_lock(&self, session: &str, lock: Arc<Mutex<()>>) {
        // Only the table and this caller hold it: nobody is waiting.
        self.locks
            .remove_if(session, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.locks.len()
    }
}

/// Completion check: exactly one interval covering `[0, total-1]`.
///
/// Also returns the receipt, the merged ranges joined by commas
/// (e.g. `0-49/100,60-99/100`).
pub fn completion(intervals: &[Interval], total: u64) -> (bool, String) {
    let receipt = render(intervals, total, ",");
    let complete = total > 0 && intervals == [Interval::new(0, total - 1)];
    (complete, receipt)
}

/// Extract the filename from a `content-disposition` value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let at = value.rfind("filename=")?;
    let rest = value[at + "filename=".len()..].trim();

    let name = match rest.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.rfind('"')?],
        None => rest.split(';').next().unwrap_or_default().trim(),
    };

    (!name.is_empty()).then(|| name.to_string())
}

fn render(intervals: &[Interval], total: u64, separator: &str) -> String {
    intervals
        .iter()
        .map(|i| format!("{i}/{total}"))
        .collect::<Vec<_>>()
        .join(separator)
}

fn validate_session(session: &str) -> UploadResult<()> {
    let valid = !session.is_empty()
        && session != "."
        && session != ".."
        && session
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidSession(session.to_string()))
    }
}
