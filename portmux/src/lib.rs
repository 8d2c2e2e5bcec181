//! # portmux
//!
//! One TCP port serving three protocols: plain HTTP/1.1, WebSocket and
//! Server-Sent Events.
//!
//! ## Quick Start
//!
//! ```ignore
//! use portmux::prelude::*;
//!
//! let (mut server, handle) = ServerBuilder::new()
//!     .bind("0.0.0.0:3000".parse()?)
//!     .build();
//!
//! server.run().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Classifier, HTTP responder, SSE formatting, WebSocket codec
//! - [`server`] - Listener, dispatcher, WebSocket sessions, SSE broadcaster
//!
//! ## HTTP surface
//!
//! | Request | Result |
//! |---|---|
//! | `GET /` | `200` `Hello, world!` |
//! | `GET /websocket` | `426 Upgrade Required` |
//! | `GET /serverside-events` | event stream |
//! | any request with `Sec-WebSocket-Key` | WebSocket echo session |
//! | anything else | `404 Not Found` |

pub mod cli;
pub mod prelude;

/// Protocol codecs.
pub mod core {
    pub use portmux_core::*;
}

/// Server engine.
pub mod server {
    pub use portmux_server::*;
}

pub use portmux_core::{SseMessage, accept_key};
pub use portmux_server::{Server, ServerBuilder, ServerConfig, ServerHandle};
