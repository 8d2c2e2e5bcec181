//! Stream codec for a multiplexed connection.
//!
//! The codec starts in head mode and classifies whatever is buffered:
//! - a frame signature switches it to frame mode on the spot;
//! - otherwise it waits for the blank line ending the request head and
//!   yields the head as either a handshake or a plain request.
//!
//! The dispatcher calls [`ConnectionCodec::upgrade`] after a successful
//! handshake. Frame mode is never left again.

use bytes::{Bytes, BytesMut};
use portmux_core::http::head_len;
use portmux_core::websocket::{Frame, FrameCodec};
use portmux_core::{Classification, Error, classify};
use tokio_util::codec::{Decoder, Encoder};

/// One decoded inbound item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Request head carrying `Sec-WebSocket-Key`.
    Handshake(BytesMut),
    /// Plain HTTP request head.
    Request(BytesMut),
    /// WebSocket frame.
    Frame(Frame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Head,
    Frames,
}

/// Classifying codec: request heads first, WebSocket frames after upgrade.
#[derive(Debug)]
pub struct ConnectionCodec {
    mode: Mode,
    max_head: usize,
    frames: FrameCodec,
}

impl ConnectionCodec {
    /// Creates a codec in head mode.
    ///
    /// # Arguments
    /// * `max_head` - Largest request head buffered before failing
    /// * `max_frame` - Largest accepted frame payload
    #[must_use]
    pub fn new(max_head: usize, max_frame: usize) -> Self {
        Self {
            mode: Mode::Head,
            max_head,
            frames: FrameCodec::new(max_frame),
        }
    }

    /// Switches to frame decoding for the rest of the connection.
    pub fn upgrade(&mut self) {
        self.mode = Mode::Frames;
    }

    /// Returns true once input is decoded as frames.
    #[must_use]
    pub fn is_upgraded(&self) -> bool {
        self.mode == Mode::Frames
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>, Error> {
        match head_len(src) {
            Some(len) => {
                let head = src.split_to(len);
                Ok(Some(Self::classify_head(head)))
            }
            None if src.len() > self.max_head => {
                Err(Error::request_head_too_large(src.len(), self.max_head))
            }
            None => Ok(None),
        }
    }

    fn classify_head(head: BytesMut) -> Inbound {
        match classify(&head) {
            Classification::WebSocketHandshake => Inbound::Handshake(head),
            _ => Inbound::Request(head),
        }
    }
}

impl Decoder for ConnectionCodec {
    type Item = Inbound;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if self.mode == Mode::Head && classify(src) == Classification::WebSocketFrame {
            tracing::debug!("frame signature on unclassified input, switching to frames");
            self.mode = Mode::Frames;
        }

        match self.mode {
            Mode::Head => self.decode_head(src),
            Mode::Frames => Ok(self.frames.decode(src)?.map(Inbound::Frame)),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        match self.mode {
            // A head cut short by EOF is still handled as one read.
            Mode::Head => {
                let head = buf.split_to(buf.len());
                Ok(Some(Self::classify_head(head)))
            }
            Mode::Frames => {
                tracing::debug!("dropping {} bytes of partial frame at EOF", buf.len());
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for ConnectionCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use portmux_core::websocket::Opcode;

    fn codec() -> ConnectionCodec {
        ConnectionCodec::new(1024, 64 * 1024)
    }

    #[test]
    fn test_plain_request() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(item, Inbound::Request(_)));
        assert!(buf.is_empty());
        assert!(!codec.is_upgraded());
    }

    #[test]
    fn test_head_split_across_reads() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&b"GET /chat HTTP/1.1\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"Sec-WebSocket-Key: abc\r\n\r\n");
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(item, Inbound::Handshake(_)));
    }

    #[test]
    fn test_frame_signature_switches_mode() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&Frame::encode_text("hi")[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert!(codec.is_upgraded());
        match item {
            Inbound::Frame(frame) => assert_eq!(frame.opcode, Opcode::Text),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_upgrade_then_frames() {
        let mut codec = codec();
        codec.upgrade();
        let mut buf = BytesMut::new();
        Frame::close().masked_with([1, 2, 3, 4]).encode(&mut buf);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(item, Inbound::Frame(f) if f.opcode == Opcode::Close));
    }

    #[test]
    fn test_oversized_head() {
        let mut codec = ConnectionCodec::new(16, 1024);
        let mut buf = BytesMut::from(&b"GET /a-very-long-path-without-end"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::RequestHeadTooLarge { .. })
        ));
    }

    #[test]
    fn test_eof_flushes_partial_head() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let item = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert!(matches!(item, Inbound::Request(_)));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_eof_drops_partial_frame() {
        let mut codec = codec();
        codec.upgrade();
        let mut buf = BytesMut::from(&[0x81u8, 0x05, b'h'][..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_passes_bytes_through() {
        let mut codec = codec();
        let mut dst = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"raw"), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"raw");
    }
}
