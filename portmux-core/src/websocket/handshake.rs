//! WebSocket opening handshake.

use crate::classify::WEBSOCKET_KEY_HEADER;
use crate::http::{CORS_HEADER, HttpRequest, HttpResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

/// GUID appended to the client key before hashing (RFC 6455 section 1.3).
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a client key.
///
/// `base64(sha1(key + GUID))`
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Extracts the client key from a raw request head.
///
/// Looks for the first header line that begins with `Sec-WebSocket-Key` and
/// returns the text after `": "`.
#[must_use]
pub fn client_key(request: &[u8]) -> Option<String> {
    HttpRequest::parse(request)
        .header(WEBSOCKET_KEY_HEADER)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Builds the `101 Switching Protocols` response for a client key.
#[must_use]
pub fn handshake_response(key: &str) -> HttpResponse {
    HttpResponse::empty(101)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Accept", accept_key(key))
        .with_header(CORS_HEADER.0, CORS_HEADER.1)
}
