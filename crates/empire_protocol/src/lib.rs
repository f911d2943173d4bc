//! # Empire Protocol
//!
//! Wire protocol for the Empires RTS server: fixed-layout binary
//! messages over a length-prefixed stream.
//!
//! Every message is one frame: `[type:u8][length:u16 LE][body]`, with
//! the length covering the 3-byte header. Receive-side buffering only
//! yields a message once its declared length has fully arrived, so
//! partial socket reads never produce partial messages.
//!
//! Client messages decode into [`client::ClientMessage`]; server
//! messages encode from [`server::ServerMessage`]. Malformed frames
//! (short body, unknown type byte, trailing bytes) are reported as
//! [`error::ProtocolError`] values for the caller to log and discard.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod client;
pub mod codec;
pub mod error;
pub mod server;

pub use client::{ClientMessage, ClientMessageType};
pub use codec::{encode_frame, BodyReader, Frame, RecvBuffer, FRAME_HEADER_LEN};
pub use error::ProtocolError;
pub use server::{ServerMessage, ServerMessageType, OBJECT_TYPE_BUILDING, OBJECT_TYPE_UNIT};
