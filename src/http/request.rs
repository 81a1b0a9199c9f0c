//! Request variants produced on a connection.
//!
//! # Responsibilities
//! - Give every request a unique id as early as possible for tracing
//! - Carry the connection handle the response is written back to
//! - Dispatch execution: synthetic errors answer directly, parsed requests
//!   go through the gateway
//!
//! # Design Decisions
//! - The variant set is closed; the queue only ever sees these three
//! - Execution never fails: every error path becomes a status code

use uuid::Uuid;

use crate::gateway::Gateway;
use crate::http::headers::HeaderMap;
use crate::http::parser::{Method, ParsedRequest};
use crate::http::response::Response;
use crate::net::ConnectionHandle;

/// One unit of work for a connection's queue.
#[derive(Debug)]
pub enum Request {
    /// The stream could not be parsed; answered with 400.
    BadRequest { id: Uuid, connection: ConnectionHandle },
    /// The client went idle mid-message; answered with 408.
    Timeout { id: Uuid, connection: ConnectionHandle },
    /// A complete, well-formed request.
    Parsed(RequestOk),
}

impl Request {
    pub fn bad_request(connection: ConnectionHandle) -> Self {
        Request::BadRequest {
            id: Uuid::new_v4(),
            connection,
        }
    }

    pub fn timeout(connection: ConnectionHandle) -> Self {
        Request::Timeout {
            id: Uuid::new_v4(),
            connection,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Request::BadRequest { id, .. } | Request::Timeout { id, .. } => *id,
            Request::Parsed(req) => req.id,
        }
    }

    pub fn connection(&self) -> &ConnectionHandle {
        match self {
            Request::BadRequest { connection, .. } | Request::Timeout { connection, .. } => connection,
            Request::Parsed(req) => &req.connection,
        }
    }

    /// Metric label for the request method.
    pub fn method_label(&self) -> &'static str {
        match self {
            Request::Parsed(req) => req.method.as_str(),
            _ => "NONE",
        }
    }

    /// Produce the response for this request.
    pub async fn execute(&self, gateway: &Gateway) -> Response {
        match self {
            Request::BadRequest { .. } => Response::bad_request(),
            Request::Timeout { .. } => Response::request_timeout(),
            Request::Parsed(req) if gateway.is_upload_route(&req.path) => gateway.upload(req).await,
            Request::Parsed(req) => gateway.proxy(req).await,
        }
    }
}

/// A successfully parsed request bound to its connection.
#[derive(Debug)]
pub struct RequestOk {
    pub id: Uuid,
    pub connection: ConnectionHandle,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub content_length: usize,
}

impl RequestOk {
    pub fn from_parsed(parsed: ParsedRequest, connection: ConnectionHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection,
            method: parsed.method,
            path: parsed.path,
            headers: parsed.headers,
            body: parsed.body,
            content_length: parsed.content_length,
        }
    }
}
