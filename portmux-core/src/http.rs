//! Minimal HTTP/1.1 request parsing and response serialization.
//!
//! Only the request line is consumed; header lines are kept verbatim so the
//! WebSocket handshake can scan them for its key. Bodies are never read.
//!
//! Responses carry no `Content-Length`. The server closes the socket after
//! every response except `426 Upgrade Required`, so clients frame the body
//! by connection close.

use bytes::{BufMut, Bytes, BytesMut};

/// CORS header attached to every response.
pub const CORS_HEADER: (&str, &str) = ("Access-Control-Allow-Origin", "*");

/// Path answered with a plain greeting.
pub const ROOT_PATH: &str = "/";
/// Path that answers `426 Upgrade Required`.
pub const WEBSOCKET_PATH: &str = "/websocket";
/// Path that subscribes the connection to the SSE stream.
pub const SSE_PATH: &str = "/serverside-events";

/// Blank line that ends a request head.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Returns the length of the request head in `bytes`, terminator included,
/// or `None` if the head is not complete yet.
#[must_use]
pub fn head_len(bytes: &[u8]) -> Option<usize> {
    crate::classify::find(bytes, HEAD_TERMINATOR).map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Returns the reason phrase for a status code.
///
/// Unknown codes map to `"Unknown Status"` instead of failing.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        426 => "Upgrade Required",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown Status",
    }
}

/// Parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target as sent.
    pub path: String,
    /// Header lines in arrival order, unparsed.
    pub headers: Vec<String>,
}

impl HttpRequest {
    /// Parses a request head.
    ///
    /// Never fails: a missing method or path becomes an empty string, which
    /// routes to `404 Not Found`. Invalid UTF-8 is replaced lossily.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split(' ');
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let headers = lines
            .take_while(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            method,
            path,
            headers,
        }
    }

    /// Returns the value of the first header line starting with `name`.
    ///
    /// The value is whatever follows the first `": "` on that line.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_once(": "))
            .map(|(_, value)| value.trim_end())
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs in emission order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a `text/plain` response with the CORS header.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::empty(status)
            .with_header("Content-Type", "text/plain")
            .with_header(CORS_HEADER.0, CORS_HEADER.1)
            .with_body(body)
    }

    /// Creates a response with no headers and no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the value of the first header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the connection stays open after this response is written.
    #[must_use]
    pub fn keep_open(&self) -> bool {
        self.status == 426
    }

    /// Serializes the status line, headers, blank line and body.
    ///
    /// # Wire Format
    /// ```text
    /// HTTP/1.1 <code> <reason>\r\n
    /// <name>: <value>\r\n ...
    /// \r\n
    /// <body>
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64 + self.body.len());
        buf.put_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status,
                reason_phrase(self.status)
            )
            .as_bytes(),
        );
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(self.body.as_bytes());
        buf.freeze()
    }
}

/// What the dispatcher should do with a classified HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write the response, then close unless [`HttpResponse::keep_open`].
    Respond(HttpResponse),
    /// Hand the connection to the SSE broadcaster.
    SubscribeSse,
}

/// Routes plain HTTP requests over the fixed path table.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpResponder;

impl HttpResponder {
    /// Creates a new responder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses `request` and routes it.
    #[must_use]
    pub fn handle(&self, request: &[u8]) -> Outcome {
        self.route(&HttpRequest::parse(request))
    }

    /// Routes an already parsed request.
    #[must_use]
    pub fn route(&self, request: &HttpRequest) -> Outcome {
        if request.method != "GET" {
            return Outcome::Respond(HttpResponse::text(404, "Not Found"));
        }
        match request.path.as_str() {
            ROOT_PATH => Outcome::Respond(HttpResponse::text(200, "Hello, world!")),
            WEBSOCKET_PATH => Outcome::Respond(
                HttpResponse::text(426, "Upgrade Required")
                    .with_header("Upgrade", "websocket")
                    .with_header("Connection", "Upgrade"),
            ),
            SSE_PATH => Outcome::SubscribeSse,
            _ => Outcome::Respond(HttpResponse::text(404, "Not Found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond(outcome: Outcome) -> HttpResponse {
        match outcome {
            Outcome::Respond(resp) => resp,
            Outcome::SubscribeSse => panic!("expected a response"),
        }
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(426), "Upgrade Required");
        assert_eq!(reason_phrase(101), "Switching Protocols");
        assert_eq!(reason_phrase(799), "Unknown Status");
    }

    #[test]
    fn test_head_len() {
        assert_eq!(head_len(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
        assert_eq!(head_len(b"GET / HTTP/1.1\r\nHost: a\r\n"), None);
    }

    #[test]
    fn test_parse_request_line_and_headers() {
        let req = HttpRequest::parse(b"GET /x HTTP/1.1\r\nHost: a\r\nX-Y: z\r\n\r\n");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/x");
        assert_eq!(req.headers, vec!["Host: a", "X-Y: z"]);
        assert_eq!(req.header("Host"), Some("a"));
        assert_eq!(req.header("Missing"), None);
    }

    #[test]
    fn test_parse_garbage() {
        let req = HttpRequest::parse(b"");
        assert_eq!(req.method, "");
        assert_eq!(req.path, "");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_route_root() {
        let resp = respond(HttpResponder::new().handle(b"GET / HTTP/1.1\r\n\r\n"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "Hello, world!");
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        assert!(!resp.keep_open());
    }

    #[test]
    fn test_route_not_found() {
        let resp = respond(HttpResponder::new().handle(b"GET /nope HTTP/1.1\r\n\r\n"));
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, "Not Found");
    }

    #[test]
    fn test_route_non_get_is_not_found() {
        let resp = respond(HttpResponder::new().handle(b"POST / HTTP/1.1\r\n\r\n"));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_route_websocket_upgrade_required() {
        let resp = respond(HttpResponder::new().handle(b"GET /websocket HTTP/1.1\r\n\r\n"));
        assert_eq!(resp.status, 426);
        assert_eq!(resp.body, "Upgrade Required");
        assert_eq!(resp.header("Upgrade"), Some("websocket"));
        assert_eq!(resp.header("Connection"), Some("Upgrade"));
        assert!(resp.keep_open());
    }

    #[test]
    fn test_route_sse() {
        let outcome = HttpResponder::new().handle(b"GET /serverside-events HTTP/1.1\r\n\r\n");
        assert_eq!(outcome, Outcome::SubscribeSse);

        let outcome = HttpResponder::new().handle(b"GET /serverside-events/x HTTP/1.1\r\n\r\n");
        assert!(matches!(outcome, Outcome::Respond(r) if r.status == 404));
    }

    #[test]
    fn test_to_bytes() {
        let resp = HttpResponse::text(200, "Hello, world!");
        assert_eq!(
            &resp.to_bytes()[..],
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nAccess-Control-Allow-Origin: *\r\n\r\nHello, world!"
        );
    }

    #[test]
    fn test_to_bytes_unknown_status() {
        let resp = HttpResponse::empty(599);
        assert_eq!(&resp.to_bytes()[..], b"HTTP/1.1 599 Unknown Status\r\n\r\n");
    }
}
