//! WebSocket support: opening handshake and frame codec.
//!
//! - [`handshake`] - `Sec-WebSocket-Accept` derivation and the 101 response
//! - [`frame`] - Frame decoding, encoding and masking
//! - [`codec`] - `tokio_util` codec over [`frame`]
//!
//! Only single, unfragmented frames without extensions are handled.

pub mod codec;
pub mod frame;
pub mod handshake;

pub use codec::FrameCodec;
pub use frame::{Frame, Opcode, apply_mask};
pub use handshake::{WEBSOCKET_GUID, accept_key, handshake_response};
