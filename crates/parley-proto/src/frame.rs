//! Length-prefixed CBOR framing.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted in either direction (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Serialize `message` and append one frame to `dst`.
///
/// `dst` is untouched when encoding fails.
pub fn encode<T: Serialize>(message: &T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let mut payload = Vec::new();
    ciborium::into_writer(message, &mut payload)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }

    let len = u32::try_from(payload.len()).map_err(|e| ProtocolError::Encode(e.to_string()))?;

    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(len);
    dst.extend_from_slice(&payload);

    Ok(())
}

/// Take one complete frame off the front of `src` and deserialize it.
///
/// Returns `Ok(None)` when `src` does not yet hold a whole frame; nothing is
/// consumed in that case. An oversized length prefix is rejected before the
/// payload arrives.
pub fn decode<T: DeserializeOwned>(src: &mut BytesMut) -> Result<Option<T>, ProtocolError> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: len, max: MAX_PAYLOAD_SIZE });
    }

    let frame_len = LENGTH_PREFIX_SIZE + len;
    if src.len() < frame_len {
        src.reserve(frame_len - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let payload = src.split_to(len);

    ciborium::from_reader(&payload[..])
        .map(Some)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}
