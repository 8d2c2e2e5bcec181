//! Per-connection protocol state machine.
//!
//! The connection task feeds every decoded [`Inbound`] item to
//! [`ConnectionDispatcher::dispatch`] and acts on the returned [`Flow`].
//! [`ConnectionDispatcher::on_close`] runs exactly once when the socket
//! ends, whatever the reason.

use crate::broadcaster::SseBroadcaster;
use crate::codec::Inbound;
use crate::connection::{ConnectionId, ConnectionState, ConnectionTable};
use crate::responder::Responder;
use crate::websocket::{FrameAction, WebSocketSession};
use portmux_core::websocket::Frame;
use portmux_core::{HttpResponder, Outcome};
use std::sync::Arc;

/// What the connection task does after an item was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Handshake done: switch the codec to frames and keep reading.
    Upgrade,
    /// Flush queued writes and close the socket.
    Close,
}

/// Routes inbound items for one connection.
pub struct ConnectionDispatcher {
    id: ConnectionId,
    state: ConnectionState,
    responder: Arc<dyn Responder>,
    http: HttpResponder,
    websocket: WebSocketSession,
    broadcaster: Arc<SseBroadcaster>,
    connections: Arc<ConnectionTable>,
}

impl ConnectionDispatcher {
    /// Creates the dispatcher for connection `id`.
    ///
    /// # Arguments
    /// * `id` - Connection identity
    /// * `responder` - Write path for this connection
    /// * `broadcaster` - Shared SSE broadcaster
    /// * `connections` - Table that mirrors this connection's state
    #[must_use]
    pub fn new(
        id: ConnectionId,
        responder: Arc<dyn Responder>,
        broadcaster: Arc<SseBroadcaster>,
        connections: Arc<ConnectionTable>,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::Unclassified,
            responder,
            http: HttpResponder::new(),
            websocket: WebSocketSession::new(id),
            broadcaster,
            connections,
        }
    }

    /// Returns the connection's current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handles one inbound item.
    pub fn dispatch(&mut self, inbound: Inbound) -> Flow {
        match (self.state, inbound) {
            (ConnectionState::SseSubscribed, _) => {
                tracing::debug!("Connection {} ignoring input on SSE stream", self.id);
                Flow::Continue
            }
            (_, Inbound::Frame(frame)) => self.on_frame(&frame),
            (ConnectionState::WebSocketOpen, _) => {
                tracing::debug!("Connection {} ignoring non-frame input", self.id);
                Flow::Continue
            }
            (_, Inbound::Handshake(head)) => self.on_handshake(&head),
            (_, Inbound::Request(head)) => self.on_request(&head),
        }
    }

    /// Tears down connection-scoped state. Removes the connection from the
    /// SSE registry if it was subscribed.
    pub fn on_close(&mut self) {
        self.broadcaster.unsubscribe(self.id);
        tracing::debug!("Connection {} closed in state {:?}", self.id, self.state);
    }

    fn on_frame(&mut self, frame: &Frame) -> Flow {
        // A frame signature on unclassified input is served as an open
        // WebSocket from here on.
        self.transition(ConnectionState::WebSocketOpen);
        match self.websocket.on_frame(frame, self.responder.as_ref()) {
            FrameAction::Close => Flow::Close,
            FrameAction::Echoed | FrameAction::Ignored => Flow::Continue,
        }
    }

    fn on_handshake(&mut self, head: &[u8]) -> Flow {
        self.transition(ConnectionState::WebSocketHandshaking);
        if self.websocket.handshake(head, self.responder.as_ref()) {
            self.transition(ConnectionState::WebSocketOpen);
            Flow::Upgrade
        } else {
            Flow::Continue
        }
    }

    fn on_request(&mut self, head: &[u8]) -> Flow {
        self.transition(ConnectionState::Http);
        match self.http.handle(head) {
            Outcome::Respond(response) => {
                tracing::debug!("Connection {} answered {}", self.id, response.status);
                if let Err(e) = self.responder.send(response.to_bytes()) {
                    tracing::warn!("Connection {} response write failed: {}", self.id, e);
                    return Flow::Close;
                }
                if response.keep_open() {
                    Flow::Continue
                } else {
                    Flow::Close
                }
            }
            Outcome::SubscribeSse => {
                match self
                    .broadcaster
                    .subscribe(self.id, Arc::clone(&self.responder))
                {
                    Ok(()) => {
                        self.transition(ConnectionState::SseSubscribed);
                        Flow::Continue
                    }
                    Err(e) => {
                        tracing::warn!("Connection {} SSE subscribe failed: {}", self.id, e);
                        Flow::Close
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(
                "Connection {} state {:?} -> {:?}",
                self.id,
                self.state,
                next
            );
            self.state = next;
            self.connections.set_state(self.id, next);
        }
    }
}
