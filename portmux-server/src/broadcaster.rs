//! Server-Sent Events broadcaster.
//!
//! The broadcaster owns the subscription registry. Connections join it
//! through [`SseBroadcaster::subscribe`] and leave it only when their socket
//! is torn down. A ticker task pushes the periodic messages to every member.

use crate::connection::ConnectionId;
use crate::responder::{Responder, SendError};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use portmux_core::SseMessage;
use portmux_core::sse::stream_response;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

/// Fans SSE messages out to subscribed connections.
pub struct SseBroadcaster {
    registry: RwLock<HashMap<ConnectionId, Arc<dyn Responder>>>,
}

impl SseBroadcaster {
    /// Creates a broadcaster with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Writes the event-stream response head and registers the connection.
    ///
    /// The head is queued before the connection joins the registry, so no
    /// broadcast can reach the client ahead of it. Subscribing twice keeps a
    /// single membership.
    ///
    /// # Errors
    /// Returns error if the head cannot be queued; the connection is then
    /// left unregistered.
    pub fn subscribe(
        &self,
        id: ConnectionId,
        responder: Arc<dyn Responder>,
    ) -> Result<(), SendError> {
        responder.send(stream_response().to_bytes())?;
        self.registry.write().insert(id, responder);

        tracing::info!(
            "Connection {} subscribed to SSE ({} subscribers)",
            id,
            self.len()
        );
        Ok(())
    }

    /// Removes a connection from the registry.
    ///
    /// # Returns
    /// True if the connection was subscribed.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let removed = self.registry.write().remove(&id).is_some();
        if removed {
            tracing::info!("Connection {} left SSE", id);
        }
        removed
    }

    /// Returns true if the connection is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, id: ConnectionId) -> bool {
        self.registry.read().contains_key(&id)
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    /// Returns true if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Formats `message` once and queues it to every subscriber.
    ///
    /// A failed write is logged and does not stop delivery to the rest.
    ///
    /// # Returns
    /// The number of subscribers the message was queued to.
    pub fn broadcast(&self, message: &SseMessage) -> usize {
        let payload = Bytes::from(message.format());
        let registry = self.registry.read();
        let mut delivered = 0;

        for (id, responder) in registry.iter() {
            match responder.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("SSE write to connection {} failed: {}", id, e),
            }
        }

        tracing::debug!(
            "Broadcast {} bytes to {}/{} subscribers",
            payload.len(),
            delivered,
            registry.len()
        );
        delivered
    }

    /// Broadcasts the four messages of one tick, in order.
    pub fn tick(&self, now: DateTime<Utc>) {
        for message in tick_messages(now) {
            self.broadcast(&message);
        }
    }

    /// Runs the periodic ticker until `shutdown` fires.
    ///
    /// The first tick happens one `period` after start.
    /// A zero `period` disables the ticker.
    pub async fn run_ticker(self: Arc<Self>, period: Duration, shutdown: CancellationToken) {
        if period.is_zero() {
            tracing::error!("SSE ticker disabled: period must be non-zero");
            return;
        }

        let start = tokio::time::Instant::now() + period;
        let mut ticks = IntervalStream::new(tokio::time::interval_at(start, period));
        tracing::info!("SSE ticker started, period {:?}", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("SSE ticker stopped");
                    return;
                }
                tick = ticks.next() => {
                    if tick.is_none() {
                        return;
                    }
                    self.tick(Utc::now());
                }
            }
        }
    }
}

impl Default for SseBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// The messages emitted on each tick, in emission order:
/// a `ping` event, a server-time data line, an id carrying the epoch
/// milliseconds, and a retry hint of 3000 ms.
#[must_use]
pub fn tick_messages(now: DateTime<Utc>) -> [SseMessage; 4] {
    let iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    [
        SseMessage::new()
            .event("ping")
            .data(format!("Ping event at {iso}")),
        SseMessage::new().data(format!("Server time: {iso}")),
        SseMessage::new().id(now.timestamp_millis().to_string()),
        SseMessage::new().retry("3000"),
    ]
}
