//! Parley wire protocol.
//!
//! Every frame on the wire is a 4-byte big-endian payload length followed by
//! a CBOR-encoded [`Request`] (client to server) or [`Response`] (server to
//! client). One request yields exactly one response.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ len: u32 BE  │ CBOR payload (len bytes)     │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! The codec is Sans-IO: [`encode`] appends to a `BytesMut`, [`decode`]
//! consumes a complete frame from the front of one and returns `Ok(None)`
//! while the frame is still incomplete.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod messages;

pub use error::ProtocolError;
pub use frame::{LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE, decode, encode};
pub use messages::{ErrorKind, Request, Response, WireMessage};
