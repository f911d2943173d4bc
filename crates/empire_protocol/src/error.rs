//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing or decoding wire messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A frame header declared a length smaller than the header itself.
    /// The stream cannot be resynchronized after this.
    #[error("Frame declares invalid length {0}")]
    BadFrameLength(u16),

    /// A message body ended before a declared field.
    #[error("Message truncated: needed {expected} more bytes, had {available}")]
    Truncated {
        /// Bytes required by the next field.
        expected: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// The frame type byte matches no known client message.
    #[error("Unknown message type {0}")]
    UnknownMessageType(u8),

    /// A message body was longer than its type allows.
    #[error("Message body has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
}
