//! WebSocket session handling: opening handshake, echo and close.

use crate::connection::ConnectionId;
use crate::responder::Responder;
use portmux_core::websocket::handshake::{client_key, handshake_response};
use portmux_core::websocket::{Frame, Opcode};

/// What the session did with an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Text frame echoed back.
    Echoed,
    /// Close frame received; the connection must close.
    Close,
    /// Frame dropped without a reply.
    Ignored,
}

/// WebSocket protocol handler for one connection.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketSession {
    id: ConnectionId,
}

impl WebSocketSession {
    /// Creates the handler for connection `id`.
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self { id }
    }

    /// Answers an opening handshake.
    ///
    /// Writes `101 Switching Protocols` when the request carries a
    /// `Sec-WebSocket-Key` header line. Without one nothing is written and
    /// the connection is left as it is.
    ///
    /// # Returns
    /// True if the 101 response was queued.
    pub fn handshake(&self, request: &[u8], responder: &dyn Responder) -> bool {
        let Some(key) = client_key(request) else {
            tracing::warn!(
                "Connection {} sent a handshake without a usable Sec-WebSocket-Key, not answering",
                self.id
            );
            return false;
        };

        match responder.send(handshake_response(&key).to_bytes()) {
            Ok(()) => {
                tracing::info!("Connection {} upgraded to WebSocket", self.id);
                true
            }
            Err(e) => {
                tracing::warn!("Connection {} handshake write failed: {}", self.id, e);
                false
            }
        }
    }

    /// Handles one decoded frame.
    ///
    /// Text frames are echoed back as a new unmasked text frame. A close
    /// frame asks for the connection to close; no close frame is sent back.
    /// Every other opcode is dropped.
    pub fn on_frame(&self, frame: &Frame, responder: &dyn Responder) -> FrameAction {
        match frame.opcode {
            Opcode::Text => {
                let text = match frame.text_payload() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Connection {} dropped text frame: {}", self.id, e);
                        return FrameAction::Ignored;
                    }
                };
                tracing::info!("Connection {} received message: {}", self.id, text);
                if let Err(e) = responder.send(Frame::encode_text(text)) {
                    tracing::warn!("Connection {} echo failed: {}", self.id, e);
                }
                FrameAction::Echoed
            }
            Opcode::Close => {
                tracing::info!("Connection {} sent close frame", self.id);
                FrameAction::Close
            }
            other => {
                tracing::debug!("Connection {} ignoring {:?} frame", self.id, other);
                FrameAction::Ignored
            }
        }
    }
}
