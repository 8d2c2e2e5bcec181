//! `tokio_util` codec for WebSocket frames.

use super::frame::Frame;
use crate::error::Error;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frame codec for an upgraded connection.
///
/// Incomplete frames stay buffered until the rest arrives.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    /// Creates a new frame codec with the specified maximum payload size.
    ///
    /// # Arguments
    /// * `max_payload` - Maximum accepted payload length in bytes
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(64 * 1024) // 64KB default
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match Frame::decode(src, self.max_payload)? {
            Some((frame, used)) => {
                src.advance(used);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::Opcode;
    use bytes::BufMut;

    #[test]
    fn test_partial_then_complete() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        buf.put_u8(0x81);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_u8(0x03);
        buf.put_slice(b"ab");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"c");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.text_payload().unwrap(), "abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        codec.encode(Frame::text("one"), &mut buf).unwrap();
        codec.encode(Frame::text("two"), &mut buf).unwrap();
        codec.encode(Frame::close(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().payload, "one");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().payload, "two");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().opcode, Opcode::Close);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_too_large_is_error() {
        let mut codec = FrameCodec::new(10);
        let mut buf = BytesMut::from(&[0x81u8, 0x20][..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
