//! Outbound write path for a connection.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Sink for bytes destined to one connection.
///
/// Writes issued through one responder reach the socket in issue order.
pub trait Responder: Send + Sync {
    /// Queues `bytes` for the connection.
    ///
    /// # Errors
    /// Returns error if the connection is gone.
    fn send(&self, bytes: Bytes) -> Result<(), SendError>;
}

/// Error type for send operations.
#[derive(Debug, Clone)]
pub struct SendError {
    /// Error message.
    pub message: String,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "send error: {}", self.message)
    }
}

impl std::error::Error for SendError {}

/// Responder backed by the connection task's unbounded write queue.
///
/// The queue has no bound: a consumer that stops reading accumulates
/// pending writes until its socket errors or closes.
#[derive(Debug, Clone)]
pub struct ChannelResponder {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelResponder {
    /// Creates a responder and the receiver the connection task drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Responder for ChannelResponder {
    fn send(&self, bytes: Bytes) -> Result<(), SendError> {
        self.tx.send(bytes).map_err(|_| SendError {
            message: "channel closed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_responder_ordering() {
        let (responder, mut rx) = ChannelResponder::channel();
        responder.send(Bytes::from_static(b"a")).unwrap();
        responder.send(Bytes::from_static(b"b")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn test_channel_responder_closed() {
        let (responder, rx) = ChannelResponder::channel();
        drop(rx);
        let err = responder.send(Bytes::from_static(b"x")).unwrap_err();
        assert_eq!(err.to_string(), "send error: channel closed");
    }
}
