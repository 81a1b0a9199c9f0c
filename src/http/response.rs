//! Response values and their wire encoding.
//!
//! # Responsibilities
//! - Represent a response as status code, headers and body
//! - Serialize to `<protocol> <code>\r\n<headers>\r\n<body>`
//! - Always derive Content-Length from the body
//!
//! # Design Decisions
//! - Header order on the wire follows map iteration and is unspecified
//! - A caller-supplied Content-Length is replaced, never trusted

use std::collections::HashMap;

pub const PROTOCOL: &str = "HTTP/1.1";
pub const CRLF: &str = "\r\n";

/// Status codes produced by the gateway.
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const BAD_GATEWAY: u16 = 502;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn bad_request() -> Self {
        Self::new(status::BAD_REQUEST)
    }

    pub fn request_timeout() -> Self {
        Self::new(status::REQUEST_TIMEOUT)
    }

    pub fn internal_error() -> Self {
        Self::new(status::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_gateway() -> Self {
        Self::new(status::BAD_GATEWAY)
    }

    /// Serialize to wire bytes with a Content-Length equal to the body length.
    pub fn encode(&self) -> Vec<u8> {
        let mut head = format!("{PROTOCOL} {}{CRLF}", self.code);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str(CRLF);
        }
        head.push_str(&format!("Content-Length: {}{CRLF}{CRLF}", self.body.len()));

        let mut wire = head.into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_length(wire: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(wire)
            .split(CRLF)
            .filter_map(|line| {
                let (name, value) = line.split_once(": ")?;
                name.eq_ignore_ascii_case("content-length").then(|| value.to_string())
            })
            .collect()
    }

    #[test]
    fn encodes_status_line_headers_and_body() {
        let wire = Response::new(status::CREATED)
            .with_header("Range", "0-49/100")
            .with_body("0-49/100")
            .encode();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("HTTP/1.1 201\r\n"));
        assert!(text.contains("\r\nRange: 0-49/100\r\n"));
        assert!(text.ends_with("\r\n\r\n0-49/100"));
    }

    #[test]
    fn content_length_is_recomputed() {
        let wire = Response::new(status::OK)
            .with_header("content-length", "999")
            .with_header("Content-Length", "7")
            .with_body("héllo".as_bytes())
            .encode();
        assert_eq!(content_length(&wire), vec!["6".to_string()]);
    }

    #[test]
    fn empty_body() {
        let wire = Response::bad_gateway().encode();
        assert_eq!(wire, b"HTTP/1.1 502\r\nContent-Length: 0\r\n\r\n");
    }
}
