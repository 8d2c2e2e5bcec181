//! # portmux server
//!
//! Server engine that multiplexes HTTP, WebSocket and Server-Sent Events over
//! one listening port.
//!
//! This crate provides:
//! - Server builder, configuration and control handle
//! - Connection table and per-connection state tags
//! - Stream codec that classifies input and switches to frame decoding
//! - Per-connection dispatcher (the protocol state machine)
//! - WebSocket session handler (handshake, echo, close)
//! - SSE broadcaster with its subscription registry and ticker

pub mod broadcaster;
pub mod builder;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod responder;
pub mod websocket;

pub use broadcaster::SseBroadcaster;
pub use builder::{Server, ServerBuilder, ServerCommand, ServerEvent, ServerHandle};
pub use codec::{ConnectionCodec, Inbound};
pub use config::ServerConfig;
pub use connection::{ConnectionId, ConnectionState, ConnectionTable};
pub use dispatcher::{ConnectionDispatcher, Flow};
pub use error::ServerError;
pub use responder::{ChannelResponder, Responder, SendError};
pub use websocket::{FrameAction, WebSocketSession};
