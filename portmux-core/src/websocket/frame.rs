//! WebSocket frame decoding and encoding.
//!
//! # Wire Format
//! ```text
//! byte 0: FIN (0x80) | RSV1-3 (0x70) | opcode (0x0F)
//! byte 1: MASK (0x80) | length code (0x7F)
//! length code 126 -> next 2 bytes, big-endian u16
//! length code 127 -> next 8 bytes, big-endian u64
//! MASK set        -> next 4 bytes are the masking key
//! payload
//! ```

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Frame opcode (low nibble of byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation of a fragmented message.
    Continuation,
    /// UTF-8 text payload.
    Text,
    /// Binary payload.
    Binary,
    /// Connection close.
    Close,
    /// Ping.
    Ping,
    /// Pong.
    Pong,
    /// Reserved opcode value.
    Reserved(u8),
}

impl Opcode {
    /// Maps the low nibble of byte 0 to an opcode.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }

    /// Returns the 4-bit wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Reserved(v) => v & 0x0F,
        }
    }
}

/// XORs `payload` in place with `key[i % 4]`.
///
/// Masking is its own inverse, so the same call unmasks.
#[inline]
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// A decoded (or to-be-encoded) WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Whether the payload is masked on the wire.
    pub masked: bool,
    /// Declared payload length.
    pub payload_len: u64,
    /// Masking key, present when `masked`.
    pub masking_key: Option<[u8; 4]>,
    /// Payload, already unmasked.
    pub payload: Bytes,
}

impl Frame {
    /// Creates an unmasked, final text frame.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let payload = Bytes::from(text.into());
        Self {
            fin: true,
            opcode: Opcode::Text,
            masked: false,
            payload_len: payload.len() as u64,
            masking_key: None,
            payload,
        }
    }

    /// Creates an unmasked, final close frame with an empty payload.
    #[must_use]
    pub fn close() -> Self {
        Self {
            fin: true,
            opcode: Opcode::Close,
            masked: false,
            payload_len: 0,
            masking_key: None,
            payload: Bytes::new(),
        }
    }

    /// Returns a copy of this frame that is masked with `key` on the wire.
    #[must_use]
    pub fn masked_with(mut self, key: [u8; 4]) -> Self {
        self.masked = true;
        self.masking_key = Some(key);
        self
    }

    /// Decodes the payload as UTF-8.
    ///
    /// # Errors
    /// Returns `Error::InvalidUtf8` if the payload is not valid UTF-8.
    pub fn text_payload(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|e| Error::InvalidUtf8 {
            offset: e.valid_up_to(),
        })
    }

    /// Decodes one frame from the front of `src`.
    ///
    /// # Arguments
    /// * `src` - Buffered input
    /// * `max_payload` - Largest accepted payload length
    ///
    /// # Returns
    /// `Ok(None)` if `src` does not yet hold a complete frame, otherwise the
    /// frame and the number of bytes it occupied.
    ///
    /// # Errors
    /// Returns `Error::FrameTooLarge` if the declared length exceeds
    /// `max_payload`, and `Error::LengthOverflow` if a 64-bit length has its
    /// top bit set or does not fit `usize`.
    pub fn decode(src: &[u8], max_payload: usize) -> Result<Option<(Self, usize)>> {
        if src.len() < 2 {
            return Ok(None);
        }

        let b0 = src[0];
        let b1 = src[1];
        let fin = b0 & 0x80 != 0;
        let opcode = Opcode::from_u8(b0);
        let masked = b1 & 0x80 != 0;
        let mut offset = 2;

        let payload_len = match b1 & 0x7F {
            126 => {
                if src.len() < offset + 2 {
                    return Ok(None);
                }
                let len = u16::from_be_bytes([src[offset], src[offset + 1]]);
                offset += 2;
                u64::from(len)
            }
            127 => {
                if src.len() < offset + 8 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&src[offset..offset + 8]);
                offset += 8;
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(Error::LengthOverflow { length: len });
                }
                len
            }
            code => u64::from(code),
        };

        let len = usize::try_from(payload_len)
            .map_err(|_| Error::LengthOverflow {
                length: payload_len,
            })?;
        if len > max_payload {
            return Err(Error::frame_too_large(payload_len, max_payload));
        }

        let masking_key = if masked {
            if src.len() < offset + 4 {
                return Ok(None);
            }
            let key = [
                src[offset],
                src[offset + 1],
                src[offset + 2],
                src[offset + 3],
            ];
            offset += 4;
            Some(key)
        } else {
            None
        };

        if src.len() < offset + len {
            return Ok(None);
        }

        let mut payload = src[offset..offset + len].to_vec();
        if let Some(key) = masking_key {
            apply_mask(&mut payload, key);
        }

        let frame = Self {
            fin,
            opcode,
            masked,
            payload_len,
            masking_key,
            payload: Bytes::from(payload),
        };
        Ok(Some((frame, offset + len)))
    }

    /// Encodes the frame into `dst`.
    ///
    /// Payloads of 126 bytes or more use the 16-bit or 64-bit extended
    /// length forms. The payload is masked on the wire when a masking key is
    /// set.
    pub fn encode(&self, dst: &mut BytesMut) {
        let len = self.payload.len();
        dst.reserve(2 + 8 + 4 + len);

        let fin = if self.fin { 0x80 } else { 0x00 };
        dst.put_u8(fin | self.opcode.as_u8());

        let mask_bit = if self.masking_key.is_some() { 0x80 } else { 0x00 };
        if len < 126 {
            dst.put_u8(mask_bit | len as u8);
        } else if len <= usize::from(u16::MAX) {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(len as u64);
        }

        match self.masking_key {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Encodes an unmasked, final text frame and returns the bytes.
    #[must_use]
    pub fn encode_text(text: &str) -> Bytes {
        let mut buf = BytesMut::new();
        Self::text(text).encode(&mut buf);
        buf.freeze()
    }
}
