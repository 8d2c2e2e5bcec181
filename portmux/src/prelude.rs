//! Prelude module for convenient imports.
//!
//! ```ignore
//! use portmux::prelude::*;
//! ```

// Codec types
pub use portmux_core::error::{Error as CoreError, Result as CoreResult};
pub use portmux_core::websocket::{Frame, FrameCodec, Opcode};
pub use portmux_core::{Classification, HttpResponder, HttpResponse, Outcome, SseMessage};

// Server types
pub use portmux_server::{
    ConnectionDispatcher, ConnectionId, ConnectionState, ConnectionTable, Responder, Server,
    ServerBuilder, ServerCommand, ServerConfig, ServerError, ServerEvent, ServerHandle,
    SseBroadcaster,
};
