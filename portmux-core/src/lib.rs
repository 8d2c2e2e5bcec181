//! # portmux core
//!
//! Protocol codecs shared by the portmux server.
//!
//! This crate provides:
//! - [`classify`] - First-buffer protocol detection
//! - [`http`] - Request line parsing, routing and response serialization
//! - [`sse`] - Server-Sent Events message formatting
//! - [`websocket`] - Handshake accept derivation and the frame codec
//! - Error types for decoding operations
//!
//! Everything here is pure: no sockets, no tasks. The server crate wires
//! these pieces into a per-connection state machine.

pub mod classify;
pub mod error;
pub mod http;
pub mod sse;
pub mod websocket;

pub use classify::{Classification, classify};
pub use error::{Error, Result};
pub use http::{HttpRequest, HttpResponder, HttpResponse, Outcome, reason_phrase};
pub use sse::SseMessage;
pub use websocket::{Frame, FrameCodec, Opcode, accept_key};
