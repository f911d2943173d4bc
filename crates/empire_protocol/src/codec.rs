//! Frame layer: `[type:u8][length:u16 LE][body]` with the length
//! covering the 3-byte header, plus the receive-side accumulator that
//! only yields a message once its declared length has fully arrived.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Bytes of the frame header: type byte plus little-endian length.
pub const FRAME_HEADER_LEN: usize = 3;

/// One complete wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type byte.
    pub msg_type: u8,
    /// Body bytes after the header.
    pub body: Bytes,
}

/// Encode a frame from a type byte and body.
///
/// # Panics
///
/// Panics if the body exceeds the u16 length space; message bodies in
/// this protocol are bounded far below it.
#[must_use]
pub fn encode_frame(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let total = FRAME_HEADER_LEN + body.len();
    assert!(total <= u16::MAX as usize, "frame too large: {total} bytes");

    let mut frame = Vec::with_capacity(total);
    frame.put_u8(msg_type);
    frame.put_u16_le(total as u16);
    frame.put_slice(body);
    frame
}

/// Receive-side partial-buffer accumulator.
///
/// Socket reads append raw bytes; [`next_frame`](Self::next_frame)
/// yields complete frames as their declared lengths arrive.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    buf: BytesMut,
}

impl RecvBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append raw bytes read from the socket.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pop the next complete frame, if one has fully arrived.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BadFrameLength`] when a header declares
    /// a length smaller than the header itself; the stream has lost
    /// framing and the connection should be dropped.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let declared = u16::from_le_bytes([self.buf[1], self.buf[2]]);
        if (declared as usize) < FRAME_HEADER_LEN {
            return Err(ProtocolError::BadFrameLength(declared));
        }
        if self.buf.len() < declared as usize {
            return Ok(None);
        }

        let msg_type = self.buf[0];
        self.buf.advance(1 + 2);
        let body = self
            .buf
            .split_to(declared as usize - FRAME_HEADER_LEN)
            .freeze();
        Ok(Some(Frame { msg_type, body }))
    }
}

/// Cursor over a message body with bounds-checked little-endian reads.
#[derive(Debug)]
pub struct BodyReader<'a> {
    bytes: &'a [u8],
}

impl<'a> BodyReader<'a> {
    /// Wrap a body slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    /// Fail unless the whole body was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TrailingBytes`].
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingBytes(self.bytes.len()))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.bytes.len() < n {
            return Err(ProtocolError::Truncated {
                expected: n,
                available: self.bytes.len(),
            });
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read a little-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a little-endian f64.
    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}
