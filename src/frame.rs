//! Frame handling: split a byte run into consecutive length-framed messages.
//!
//! Each frame's length comes from its own header. A frame that fails to decode
//! is removed (its bytes are still consumed, so decoding continues with the next
//! one). A trailing partial frame is reported, not decoded.

use crate::codec::{Codec, CodecError, Message};
use tracing::debug;

/// A message whose total length can be read from a fixed-size header prefix.
pub trait Framed: Message {
    const NAME: &'static str;

    /// Total frame length in bytes, or `None` if `bytes` is too short to tell.
    fn frame_length(bytes: &[u8]) -> Option<usize>;
}

/// Result of decoding a byte run: valid messages and frames that were dropped.
#[derive(Debug)]
pub struct FrameDecodeResult<T> {
    pub messages: Vec<DecodedMessage<T>>,
    pub removed: Vec<RemovedMessage>,
    /// Bytes at the end that do not form a complete frame.
    pub trailing: usize,
}

#[derive(Debug)]
pub struct DecodedMessage<T> {
    pub message: T,
    pub byte_range: (usize, usize),
}

#[derive(Debug)]
pub struct RemovedMessage {
    pub name: &'static str,
    pub byte_range: (usize, usize),
    pub reason: CodecError,
}

/// Decode every complete frame in `bytes`.
pub fn decode_frames<T: Framed>(codec: &Codec<'_>, bytes: &[u8], args: T::Args) -> FrameDecodeResult<T> {
    let mut messages = Vec::new();
    let mut removed = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let len = match T::frame_length(rest) {
            Some(len) if len > 0 && len <= rest.len() => len,
            _ => break,
        };
        let range = (offset, offset + len);
        match codec.parse::<T>(&rest[..len], args) {
            Ok(message) => messages.push(DecodedMessage { message, byte_range: range }),
            Err(reason) => {
                debug!(frame = T::NAME, start = range.0, end = range.1, %reason, "removing frame");
                removed.push(RemovedMessage { name: T::NAME, byte_range: range, reason });
            }
        }
        offset += len;
    }

    FrameDecodeResult { messages, removed, trailing: bytes.len() - offset }
}
