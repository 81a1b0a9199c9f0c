//! Execution context shared by every connection.
//!
//! # Responsibilities
//! - Route parsed requests: upload path vs. plain proxy
//! - Turn upload requests into chunks for the tracker
//! - Build upstream requests and map their outcome to responses
//!
//! # Data Flow
//! ```text
//! RequestOk
//!     ├─ path contains route marker → UploadTracker::accept_chunk
//!     │       ├─ Partial  → 201 + Range receipt
//!     │       └─ Complete → POST completion notice upstream → relay
//!     └─ otherwise → forward method/path/headers/body upstream → relay
//! ```

use std::sync::Arc;

use crate::config::{GatewayConfig, UploadConfig};
use crate::http::parser::Method;
use crate::http::request::RequestOk;
use crate::http::response::{status, Response};
use crate::upload::{filename_from_disposition, UploadChunk, UploadError, UploadProgress, UploadTracker};
use crate::upstream::{relay, Forward, ForwardRequest, Payload, UpstreamError, UpstreamForwarder};

const SESSION_HEADER: &str = "session-id";
const RANGE_HEADER: &str = "x-content-range";
const DISPOSITION_HEADER: &str = "content-disposition";

/// Shared request execution context.
#[derive(Clone)]
pub struct Gateway {
    forwarder: Arc<dyn Forward>,
    uploads: UploadTracker,
    route_marker: String,
    client_header: String,
}

impl Gateway {
    pub fn new(forwarder: Arc<dyn Forward>, uploads: UploadTracker, config: &UploadConfig) -> Self {
        Self {
            forwarder,
            uploads,
            route_marker: config.route_marker.clone(),
            client_header: config.client_header.to_ascii_lowercase(),
        }
    }

    /// Gateway talking to the configured upstream over HTTP.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let forwarder = UpstreamForwarder::new(&config.upstream)?;
        Ok(Self::new(
            Arc::new(forwarder),
            UploadTracker::new(&config.upload.data_dir),
            &config.upload,
        ))
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    pub fn is_upload_route(&self, path: &str) -> bool {
        path.contains(&self.route_marker)
    }

    /// Forward a request unchanged apart from hop headers.
    pub async fn proxy(&self, req: &RequestOk) -> Response {
        let payload = match req.method {
            Method::Get => Payload::Empty,
            Method::Post => Payload::Bytes(req.body.clone()),
        };
        let forward = ForwardRequest {
            request_id: req.id,
            method: req.method,
            path: req.path.clone(),
            headers: req
                .headers
                .iter_raw()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            payload,
        };
        relay(self.forwarder.as_ref(), forward).await
    }

    /// Record an upload chunk; on completion notify the upstream.
    pub async fn upload(&self, req: &RequestOk) -> Response {
        let progress = match self.chunk(req) {
            Ok(chunk) => self.uploads.accept_chunk(&chunk).await,
            Err(e) => Err(e),
        };

        match progress {
            Ok(UploadProgress::Partial { receipt }) => {
                tracing::debug!(request_id = %req.id, receipt = %receipt, "Upload partially received");
                Response::new(status::CREATED)
                    .with_header("Range", receipt.clone())
                    .with_body(receipt)
            }
            Ok(UploadProgress::Complete { filename, data_path }) => {
                tracing::info!(
                    request_id = %req.id,
                    filename = %filename,
                    data_path = %data_path.display(),
                    "Upload complete, notifying upstream"
                );
                let headers = req
                    .headers
                    .get_raw(&self.client_header)
                    .map(|value| vec![(self.client_header.clone(), value.to_string())])
                    .unwrap_or_default();
                let notice = ForwardRequest {
                    request_id: req.id,
                    method: Method::Post,
                    path: req.path.clone(),
                    headers,
                    payload: Payload::Form(vec![
                        (".name".to_string(), filename),
                        (".path".to_string(), data_path.to_string_lossy().into_owned()),
                    ]),
                };
                relay(self.forwarder.as_ref(), notice).await
            }
            Err(e) => {
                tracing::error!(request_id = %req.id, path = %req.path, error = %e, "Upload chunk rejected");
                Response::internal_error()
            }
        }
    }

    fn chunk(&self, req: &RequestOk) -> Result<UploadChunk, UploadError> {
        let session_id = req
            .headers
            .get_raw(SESSION_HEADER)
            .ok_or(UploadError::MissingHeader(SESSION_HEADER))?;
        let content_range = req
            .headers
            .get(RANGE_HEADER)
            .ok_or(UploadError::MissingHeader(RANGE_HEADER))?;
        let disposition = req
            .headers
            .get_raw(DISPOSITION_HEADER)
            .ok_or(UploadError::MissingHeader(DISPOSITION_HEADER))?;
        let filename = filename_from_disposition(disposition).ok_or(UploadError::MissingFilename)?;

        Ok(UploadChunk {
            session_id: session_id.to_string(),
            content_range: content_range.to_string(),
            filename,
            body: req.body.clone(),
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("uploads", &self.uploads)
            .field("route_marker", &self.route_marker)
            .field("client_header", &self.client_header)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{gateway, Recorder};
    use super::*;
    use crate::http::headers::HeaderMap;
    use crate::net::ConnectionHandle;
    use uuid::Uuid;

    fn request(method: Method, path: &str, headers: &[(&str, &str)], body: &[u8]) -> RequestOk {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(name, value);
        }
        RequestOk {
            id: Uuid::new_v4(),
            connection: ConnectionHandle::new(Uuid::new_v4(), tokio::io::sink()),
            method,
            path: path.into(),
            headers: map,
            body: body.to_vec(),
            content_length: body.len(),
        }
    }

    fn chunk(range: &str, body: &[u8]) -> RequestOk {
        request(
            Method::Post,
            "/api/file/upload",
            &[
                ("Session-ID", "Sess1"),
                ("X-Content-Range", range),
                ("Content-Disposition", "attachment; filename=\"Movie.MP4\""),
                ("X-Trassnet-Client", "Client-AB"),
                ("Content-Length", &body.len().to_string()),
            ],
            body,
        )
    }

    #[tokio::test]
    async fn proxy_forwards_raw_headers_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"pong");
        let gateway = gateway(&recorder, dir.path());

        let req = request(Method::Post, "/echo", &[("X-Token", "AbC")], b"payload");
        let response = gateway.proxy(&req).await;
        assert_eq!(response.code, 200);
        assert_eq!(response.body, b"pong");

        let sent = recorder.requests();
        assert_eq!(sent[0].request_id, req.id);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/echo");
        assert_eq!(sent[0].headers, vec![("x-token".to_string(), "AbC".to_string())]);
        assert_eq!(sent[0].payload, Payload::Bytes(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn get_is_forwarded_without_body() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"");
        let gateway = gateway(&recorder, dir.path());

        gateway.proxy(&request(Method::Get, "/x", &[], b"")).await;
        assert_eq!(recorder.requests()[0].payload, Payload::Empty);
    }

    #[tokio::test]
    async fn non_200_upstream_is_502() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(404, b"missing");
        let gateway = gateway(&recorder, dir.path());

        let response = gateway.proxy(&request(Method::Get, "/x", &[], b"")).await;
        assert_eq!(response.code, 502);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn partial_upload_returns_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"");
        let gateway = gateway(&recorder, dir.path());

        let response = gateway.upload(&chunk("0-4/10", b"hello")).await;
        assert_eq!(response.code, 201);
        assert_eq!(response.headers.get("Range").map(String::as_str), Some("0-4/10"));
        assert_eq!(response.body, b"0-4/10");
        assert!(recorder.requests().is_empty());
    }

    #[tokio::test]
    async fn completed_upload_notifies_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"stored");
        let gateway = gateway(&recorder, dir.path());

        assert_eq!(gateway.upload(&chunk("5-9/10", b"world")).await.code, 201);
        let response = gateway.upload(&chunk("0-4/10", b"hello")).await;
        assert_eq!(response.code, 200);
        assert_eq!(response.body, b"stored");

        let data_path = gateway.uploads().data_path("Sess1");
        assert_eq!(std::fs::read(&data_path).unwrap(), b"helloworld");

        let sent = recorder.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/api/file/upload");
        assert_eq!(
            sent[0].headers,
            vec![("x-trassnet-client".to_string(), "Client-AB".to_string())]
        );
        assert_eq!(
            sent[0].payload,
            Payload::Form(vec![
                (".name".to_string(), "Movie.MP4".to_string()),
                (".path".to_string(), data_path.to_string_lossy().into_owned()),
            ])
        );
    }

    #[tokio::test]
    async fn upload_without_filename_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"");
        let gateway = gateway(&recorder, dir.path());

        let req = request(
            Method::Post,
            "/file/upload",
            &[
                ("session-id", "s"),
                ("x-content-range", "0-0/1"),
                ("content-disposition", "attachment"),
            ],
            b"x",
        );
        assert_eq!(gateway.upload(&req).await.code, 500);
        assert!(!gateway.uploads().state_path("s").exists());
    }

    #[tokio::test]
    async fn upload_with_bad_range_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"");
        let gateway = gateway(&recorder, dir.path());

        assert_eq!(gateway.upload(&chunk("0-9/5", b"0123456789")).await.code, 500);
        assert_eq!(gateway.upload(&chunk("0-4/10", b"abc")).await.code, 500);
    }

    #[test]
    fn route_matches_marker_anywhere_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::replying(200, b"");
        let gateway = gateway(&recorder, dir.path());

        assert!(gateway.is_upload_route("/vshow/file/upload?part=1"));
        assert!(!gateway.is_upload_route("/file/download"));
    }
}
