//! Forwarding to the fixed upstream.
//!
//! # Responsibilities
//! - Issue GET/POST to `base_url + path` with the given headers
//! - Send either the raw body or URL-encoded form fields
//! - Retry transport failures with backoff
//! - Map the outcome to a gateway response (200 relayed, otherwise 502)

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::http::parser::Method;
use crate::http::response::{status, Response};
use crate::observability::metrics;
use crate::upstream::backoff::RetryPolicy;

/// Client headers that describe the client-side hop and are not forwarded.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "proxy-connection",
];

/// Errors from talking to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured base URL or the request path does not form a valid URL.
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    /// Every attempt failed at the transport level.
    #[error("upstream unreachable after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Request body sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Bytes(Vec<u8>),
    /// URL-encoded form fields, in order.
    Form(Vec<(String, String)>),
}

/// Everything the forwarder needs to issue one upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    /// Originating request id, for tracing only.
    pub request_id: Uuid,
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub payload: Payload,
}

/// Upstream status and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Vec<u8>,
}

pub type ForwardFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UpstreamReply, UpstreamError>> + Send + 'a>>;

/// Sends a request to the upstream and returns its reply.
///
/// Implementations own their retry behavior; callers see one final outcome.
pub trait Forward: Send + Sync {
    fn send(&self, request: ForwardRequest) -> ForwardFuture<'_>;
}

/// Forward `request` and map the outcome to the response returned to the client.
///
/// A transport failure or any status other than 200 becomes an empty 502.
pub async fn relay(forwarder: &dyn Forward, request: ForwardRequest) -> Response {
    let request_id = request.request_id;
    let path = request.path.clone();

    match forwarder.send(request).await {
        Ok(reply) if reply.status == status::OK => {
            Response::new(status::OK).with_body(reply.body)
        }
        Ok(reply) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                upstream_status = reply.status,
                "Upstream answered with non-200 status"
            );
            Response::bad_gateway()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Upstream request failed");
            Response::bad_gateway()
        }
    }
}

/// [`Forward`] implementation over a reqwest client.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl UpstreamForwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(UpstreamError::Client)?;

        tracing::info!(
            base_url = %base_url,
            max_attempts = config.max_attempts,
            "Upstream forwarder initialized"
        );

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Append the request path to the base URL.
    ///
    /// Plain concatenation: a path like `//other-host/x` must not be able to
    /// change the authority the way `Url::join` would.
    fn target(&self, path: &str) -> Result<Url, UpstreamError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&url)?)
    }

    fn build(&self, url: &Url, request: &ForwardRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };

        for (name, value) in &request.headers {
            if HOP_HEADERS.contains(&name.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        match &request.payload {
            Payload::Empty => builder,
            Payload::Bytes(bytes) => builder.body(bytes.clone()),
            Payload::Form(fields) => builder.form(fields),
        }
    }

    async fn attempt(&self, url: &Url, request: &ForwardRequest) -> Result<UpstreamReply, reqwest::Error> {
        let response = self.build(url, request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(UpstreamReply { status, body })
    }

    async fn execute(&self, request: ForwardRequest) -> Result<UpstreamReply, UpstreamError> {
        let url = self.target(&request.path)?;
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(&url, &request).await {
                Ok(reply) => {
                    metrics::record_upstream_attempt("ok");
                    tracing::debug!(
                        request_id = %request.request_id,
                        method = %request.method,
                        url = %url,
                        status = reply.status,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Upstream replied"
                    );
                    return Ok(reply);
                }
                Err(e) if !e.is_builder() && self.retry.allows_retry(attempt) => {
                    metrics::record_upstream_attempt("retry");
                    let delay = self.retry.delay(attempt);
                    tracing::info!(
                        request_id = %request.request_id,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    metrics::record_upstream_attempt("failed");
                    return Err(UpstreamError::Transport {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

impl Forward for UpstreamForwarder {
    fn send(&self, request: ForwardRequest) -> ForwardFuture<'_> {
        Box::pin(self.execute(request))
    }
}
