//! Fuzz target for the length-prefixed CBOR codec
//!
//! Feed arbitrary bytes to the decoder in arbitrary chunk sizes, the way
//! they arrive off a socket.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A length prefix over the limit is rejected as `FrameTooLarge`
//! - `Ok(None)` consumes nothing
//! - Every decoded request re-encodes and decodes to itself

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use parley_proto::{MAX_PAYLOAD_SIZE, ProtocolError, Request, decode, encode};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    chunk_sizes: Vec<u8>,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let mut buf = BytesMut::new();
    let mut remaining = &input.data[..];
    let mut sizes = input.chunk_sizes.iter().cycle();

    while !remaining.is_empty() {
        let size = sizes.next().map_or(remaining.len(), |s| usize::from(*s).max(1));
        let (chunk, rest) = remaining.split_at(size.min(remaining.len()));
        buf.extend_from_slice(chunk);
        remaining = rest;

        loop {
            let before = buf.len();
            match decode::<Request>(&mut buf) {
                Ok(Some(request)) => {
                    let mut out = BytesMut::new();
                    encode(&request, &mut out).expect("decoded request must re-encode");
                    let again = decode::<Request>(&mut out).expect("re-encoded frame must decode");
                    assert_eq!(again, Some(request));
                    assert!(out.is_empty());
                },
                Ok(None) => {
                    assert_eq!(buf.len(), before, "partial frame consumed bytes");
                    break;
                },
                Err(ProtocolError::FrameTooLarge { size, max }) => {
                    assert!(size > max);
                    assert_eq!(max, MAX_PAYLOAD_SIZE);
                    return;
                },
                Err(_) => return,
            }
        }
    }
});
