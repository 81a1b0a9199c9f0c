//! Incremental HTTP/1.1 request parsing.
//!
//! # Responsibilities
//! - Turn a byte stream into a sequence of parsed requests
//! - Cope with partial reads: a stage that lacks bytes stalls until more arrive
//! - Honor pipelined requests already sitting in the buffer, in arrival order
//!
//! # Stages
//! ```text
//! Line → Header → Body → Done → (reset) Line
//! ```
//!
//! [`RequestParser`] is the pure state machine: it only sees the unconsumed
//! bytes and reports how many it consumed. [`ParserTask`] owns the connection's
//! read half and a pooled buffer and drives the state machine as bytes arrive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memchr::memchr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::buffer::PooledBuffer;
use crate::http::headers::HeaderMap;

/// Accepted request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that make a message unparseable. Fatal for the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    RequestLine,

    #[error("unsupported request method")]
    Method,

    #[error("malformed header line")]
    Header,

    #[error("missing or invalid content-length")]
    ContentLength,

    #[error("message does not fit in a {limit} byte buffer")]
    TooLarge { limit: usize },
}

/// Parse stage of the message currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Line,
    Header,
    Body,
    Done,
}

/// A fully parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub content_length: usize,
}

/// Outcome of one state machine step.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Not enough bytes to make progress.
    Stalled,
    /// Moved forward, consuming this many bytes (possibly zero on a stage change).
    Advanced(usize),
    /// A message finished. The parser is back at [`Stage::Line`].
    Complete {
        consumed: usize,
        request: ParsedRequest,
    },
}

/// Request state machine.
#[derive(Debug)]
pub struct RequestParser {
    stage: Stage,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
    content_length: usize,
    max_body: usize,
}

impl RequestParser {
    /// `max_body` bounds the accepted content-length; larger bodies can never
    /// fit the connection buffer.
    pub fn new(max_body: usize) -> Self {
        Self {
            stage: Stage::Line,
            method: Method::default(),
            path: String::new(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            content_length: 0,
            max_body,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run one step over the unconsumed bytes.
    pub fn step(&mut self, unconsumed: &[u8]) -> Result<Step, ParseError> {
        match self.stage {
            Stage::Line => self.parse_line(unconsumed),
            Stage::Header => self.parse_header(unconsumed),
            Stage::Body => self.parse_body(unconsumed),
            Stage::Done => Ok(self.finish()),
        }
    }

    /// Step until the parser stalls or completes a message.
    ///
    /// Returns the bytes consumed and the completed request, if any. At most
    /// one request is returned per call so the caller can hand it off before
    /// parsing the next pipelined message.
    pub fn parse(&mut self, unconsumed: &[u8]) -> Result<(usize, Option<ParsedRequest>), ParseError> {
        let mut offset = 0;
        loop {
            match self.step(&unconsumed[offset..])? {
                Step::Stalled => return Ok((offset, None)),
                Step::Advanced(n) => offset += n,
                Step::Complete { consumed, request } => {
                    return Ok((offset + consumed, Some(request)));
                }
            }
        }
    }

    fn parse_line(&mut self, buf: &[u8]) -> Result<Step, ParseError> {
        let Some(lf) = memchr(b'\n', buf) else {
            return Ok(Step::Stalled);
        };
        if lf == 0 || buf[lf - 1] != b'\r' {
            return Err(ParseError::RequestLine);
        }

        let line = std::str::from_utf8(&buf[..lf - 1]).map_err(|_| ParseError::RequestLine)?;
        let mut parts = line.splitn(3, ' ');
        let method = parts.next().unwrap_or_default();
        let path = parts.next().ok_or(ParseError::Method)?;
        // The version token is ignored.

        self.method = Method::from_token(method).ok_or(ParseError::Method)?;
        if path.is_empty() {
            return Err(ParseError::RequestLine);
        }
        self.path = path.to_string();
        self.stage = Stage::Header;
        Ok(Step::Advanced(lf + 1))
    }

    fn parse_header(&mut self, buf: &[u8]) -> Result<Step, ParseError> {
        let Some(lf) = memchr(b'\n', buf) else {
            return Ok(Step::Stalled);
        };
        if lf == 0 || buf[lf - 1] != b'\r' {
            return Err(ParseError::Header);
        }

        // Bare CRLF ends the header block.
        if lf == 1 {
            self.stage = Stage::Body;
            return Ok(Step::Advanced(2));
        }

        let line = &buf[..lf - 1];
        let colon = memchr(b':', line).ok_or(ParseError::Header)?;
        let name = std::str::from_utf8(&line[..colon]).map_err(|_| ParseError::Header)?;
        // Values may carry non-UTF-8 bytes (e.g. Latin-1 filenames).
        let value = String::from_utf8_lossy(&line[colon + 1..]);
        if name.trim().is_empty() {
            return Err(ParseError::Header);
        }

        self.headers.insert(name, &value);
        Ok(Step::Advanced(lf + 1))
    }

    fn parse_body(&mut self, buf: &[u8]) -> Result<Step, ParseError> {
        if self.method == Method::Get {
            self.stage = Stage::Done;
            return Ok(Step::Advanced(0));
        }

        let length = self
            .headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .ok_or(ParseError::ContentLength)?;
        if length > self.max_body {
            return Err(ParseError::TooLarge {
                limit: self.max_body,
            });
        }
        if buf.len() < length {
            return Ok(Step::Stalled);
        }

        self.body = buf[..length].to_vec();
        self.content_length = length;
        self.stage = Stage::Done;
        Ok(Step::Advanced(length))
    }

    fn finish(&mut self) -> Step {
        let request = ParsedRequest {
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body),
            content_length: std::mem::take(&mut self.content_length),
        };
        self.stage = Stage::Line;
        Step::Complete {
            consumed: 0,
            request,
        }
    }
}

/// Signals from the read task to the connection handler.
#[derive(Debug)]
pub enum ParserEvent {
    /// A complete request.
    Parsed(ParsedRequest),
    /// The stream is unparseable. The task stops after sending this.
    Failed(ParseError),
}

/// Per-connection read-and-parse task.
///
/// Reads into `buffer[filled..]`, parses `buffer[parse_index..filled]` and
/// hands each completed request over a single-slot channel. A closed channel
/// on the receiving side means the stream ended (EOF, read error or parse
/// failure).
pub struct ParserTask<R> {
    connection_id: Uuid,
    reader: R,
    buffer: PooledBuffer,
    filled: usize,
    parse_index: usize,
    parser: RequestParser,
    /// Bytes of the in-progress message already consumed by the parser.
    partial: usize,
    unparsed: Arc<AtomicUsize>,
    events: mpsc::Sender<ParserEvent>,
}

impl<R: AsyncRead + Unpin> ParserTask<R> {
    pub fn new(
        connection_id: Uuid,
        reader: R,
        buffer: PooledBuffer,
        events: mpsc::Sender<ParserEvent>,
        unparsed: Arc<AtomicUsize>,
    ) -> Self {
        let max_body = buffer.len();
        Self {
            connection_id,
            reader,
            buffer,
            filled: 0,
            parse_index: 0,
            parser: RequestParser::new(max_body),
            partial: 0,
            unparsed,
            events,
        }
    }

    /// Read and parse until the stream ends or fails to parse.
    pub async fn run(mut self) {
        loop {
            if self.filled == self.buffer.len() {
                if self.parse_index == 0 {
                    let limit = self.buffer.len();
                    self.fail(ParseError::TooLarge { limit }).await;
                    break;
                }
                self.compact();
            }

            match self.reader.read(&mut self.buffer[self.filled..]).await {
                Ok(0) => {
                    tracing::debug!(connection_id = %self.connection_id, "Peer closed read side");
                    break;
                }
                Ok(n) => self.filled += n,
                Err(e) => {
                    tracing::debug!(connection_id = %self.connection_id, error = %e, "Read failed");
                    break;
                }
            }

            if !self.drain().await {
                break;
            }
        }
        tracing::trace!(connection_id = %self.connection_id, "Parser stopped");
    }

    /// Parse every complete message currently buffered.
    ///
    /// Returns false when the task must stop.
    async fn drain(&mut self) -> bool {
        loop {
            let outcome = self
                .parser
                .parse(&self.buffer[self.parse_index..self.filled]);

            match outcome {
                Ok((consumed, request)) => {
                    self.parse_index += consumed;
                    let Some(request) = request else {
                        self.partial += consumed;
                        self.publish_unparsed();
                        return true;
                    };
                    self.partial = 0;

                    // Carry pipelined bytes to the front for the next message.
                    self.compact();
                    self.publish_unparsed();
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        method = %request.method,
                        path = %request.path,
                        content_length = request.content_length,
                        "Request parsed"
                    );
                    if self.events.send(ParserEvent::Parsed(request)).await.is_err() {
                        return false;
                    }
                }
                Err(err) => {
                    self.fail(err).await;
                    return false;
                }
            }
        }
    }

    async fn fail(&mut self, err: ParseError) {
        tracing::warn!(
            connection_id = %self.connection_id,
            error = %err,
            buffered = self.filled - self.parse_index,
            "Request parse failed"
        );
        let _ = self.events.send(ParserEvent::Failed(err)).await;
    }

    fn compact(&mut self) {
        self.buffer.copy_within(self.parse_index..self.filled, 0);
        self.filled -= self.parse_index;
        self.parse_index = 0;
    }

    /// Publish how many bytes belong to a message that has not completed yet.
    fn publish_unparsed(&self) {
        self.unparsed.store(
            self.partial + self.filled - self.parse_index,
            Ordering::Release,
        );
    }
}
