//! `start-end/total` range values.

use std::fmt;
use std::str::FromStr;

use crate::upload::types::UploadError;
use crate::upload::Interval;

/// A parsed `x-content-range` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    /// Reject ranges that cannot describe a slice of a `total`-byte file
    /// or that disagree with the chunk body length.
    pub fn validate(&self, body_len: usize) -> Result<(), UploadError> {
        let reason = if self.start > self.end {
            Some("start after end")
        } else if self.end >= self.total {
            Some("end beyond total")
        } else if self.end - self.start + 1 != body_len as u64 {
            Some("length differs from body")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(UploadError::InvalidRange {
                range: self.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.start, self.end, self.total)
    }
}

impl FromStr for ContentRange {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range(s)
    }
}

/// Parse `"<start>-<end>/<total>"`.
///
/// A leading non-digit prefix such as `bytes ` is skipped. Every component
/// must be a non-negative decimal integer.
pub fn parse_range(value: &str) -> Result<ContentRange, UploadError> {
    let malformed = || UploadError::MalformedRange(value.to_string());

    let trimmed = value.trim();
    let digits = trimmed.trim_start_matches(|c: char| !c.is_ascii_digit());

    let (start, rest) = digits.split_once('-').ok_or_else(malformed)?;
    let (end, total) = rest.split_once('/').ok_or_else(malformed)?;

    Ok(ContentRange {
        start: number(start).ok_or_else(malformed)?,
        end: number(end).ok_or_else(malformed)?,
        total: number(total).ok_or_else(malformed)?,
    })
}

fn number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
