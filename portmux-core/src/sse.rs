//! Server-Sent Events message formatting.

use crate::http::{CORS_HEADER, HttpResponse};

/// One SSE event record. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    /// Event type (`event:` line).
    pub event: Option<String>,
    /// Payload (`data:` line).
    pub data: Option<String>,
    /// Last-event id (`id:` line).
    pub id: Option<String>,
    /// Reconnection delay in milliseconds (`retry:` line).
    pub retry: Option<String>,
}

impl SseMessage {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event type.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Sets the data field.
    #[must_use]
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Sets the id field.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the retry field.
    #[must_use]
    pub fn retry(mut self, retry: impl Into<String>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Formats the message for the `text/event-stream` wire.
    ///
    /// Present fields are emitted in the order `event`, `data`, `id`,
    /// `retry`, one `<field>: <value>\n` line each, followed by a blank
    /// line. A message with no fields formats to `"\n"`.
    #[must_use]
    pub fn format(&self) -> String {
        let mut out = String::new();
        let fields = [
            ("event", &self.event),
            ("data", &self.data),
            ("id", &self.id),
            ("retry", &self.retry),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }
}

/// Response head that opens an event stream.
#[must_use]
pub fn stream_response() -> HttpResponse {
    HttpResponse::empty(200)
        .with_header("Content-Type", "text/event-stream")
        .with_header("Cache-Control", "no-cache")
        .with_header("Connection", "keep-alive")
        .with_header(CORS_HEADER.0, CORS_HEADER.1)
}
