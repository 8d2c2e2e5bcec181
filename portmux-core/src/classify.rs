//! First-buffer protocol detection.
//!
//! A connection that has not yet been classified hands its buffered input to
//! [`classify`], which picks exactly one of three interpretations. The frame
//! check is a heuristic: it accepts any buffer whose first byte has the FIN
//! bit set and a nonzero opcode, so a non-final frame or a continuation frame
//! is read as HTTP. Connections that completed a handshake never come back
//! here; their input goes straight to the frame decoder.

/// Header name whose presence marks a WebSocket opening handshake.
pub const WEBSOCKET_KEY_HEADER: &str = "Sec-WebSocket-Key";

/// Result of classifying a connection's first buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// HTTP request carrying a `Sec-WebSocket-Key` header.
    WebSocketHandshake,
    /// Raw WebSocket frame (FIN set, opcode nonzero).
    WebSocketFrame,
    /// Anything else is treated as a plain HTTP request.
    HttpRequest,
}

/// Classifies the bytes buffered on an unclassified connection.
///
/// The handshake check runs first, so any input containing
/// `Sec-WebSocket-Key` is a handshake no matter what its first byte is.
#[must_use]
pub fn classify(bytes: &[u8]) -> Classification {
    if contains(bytes, WEBSOCKET_KEY_HEADER.as_bytes()) {
        return Classification::WebSocketHandshake;
    }
    if looks_like_frame(bytes) {
        return Classification::WebSocketFrame;
    }
    Classification::HttpRequest
}

/// Returns true if byte 0 has the FIN bit set and a nonzero opcode.
#[inline]
#[must_use]
pub fn looks_like_frame(bytes: &[u8]) -> bool {
    match bytes.first() {
        Some(&b0) => b0 & 0x80 != 0 && b0 & 0x0F != 0,
        None => false,
    }
}

/// Case-sensitive substring search over raw bytes.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Returns the offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
