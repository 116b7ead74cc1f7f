//! Wire framing for the broker protocol.
//!
//! A frame is `<` FIELD (`, ` FIELD)* `>`. FIELD is any non-empty sequence
//! of bytes containing neither `,` nor `>`. This crate owns the codec only
//! — command dispatch and the command shapes themselves (`CONN`, `SUB`,
//! `PUB`, `DISC` and their replies) live in `broker-core` and the two
//! service binaries, same split as `rt-protocol` vs. the services that
//! interpret its messages.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum accepted frame size in bytes, delimiters included.
pub const MAX_FRAME_SIZE: usize = 1024;

const FIELD_SEPARATOR: &str = ", ";

/// A decoded frame: the ordered list of fields between `<` and `>`.
pub type Frame = Vec<String>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error decoding frame: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec for the `<field, field, ...>` wire frame.
///
/// Malformed and oversized frames are never surfaced as decode errors: per
/// the protocol's error taxonomy they are dropped silently, with only their
/// bytes consumed from the stream. A `FrameError` from `decode` means the
/// underlying transport failed, not that a frame was malformed.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            let Some(start) = src.iter().position(|&b| b == b'<') else {
                // No frame start buffered. Cap unbounded growth from a
                // client that never sends a `<`.
                if src.len() > MAX_FRAME_SIZE {
                    src.clear();
                }
                return Ok(None);
            };
            if start > 0 {
                src.advance(start);
            }

            let search_limit = MAX_FRAME_SIZE.min(src.len());
            let end_rel = src[..search_limit].iter().position(|&b| b == b'>');

            match end_rel {
                Some(end) => {
                    let frame_len = end + 1;
                    let frame = src.split_to(frame_len);
                    let inner = &frame[1..frame_len - 1];
                    if inner.is_empty() {
                        continue; // dropped: empty frame
                    }
                    let Ok(text) = std::str::from_utf8(inner) else {
                        continue; // dropped: not valid UTF-8
                    };
                    let tokens: Vec<String> =
                        text.split(FIELD_SEPARATOR).map(str::to_owned).collect();
                    if tokens.iter().any(String::is_empty) {
                        continue; // dropped: an empty field
                    }
                    return Ok(Some(tokens));
                }
                None if src.len() >= MAX_FRAME_SIZE => {
                    // No closing `>` within the size cap: this frame is
                    // oversized. Drain it and keep scanning for the next
                    // frame start in whatever follows.
                    src.advance(MAX_FRAME_SIZE);
                    continue;
                }
                None => return Ok(None), // need more bytes
            }
        }
    }
}

impl<T> Encoder<T> for FrameCodec
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    type Error = FrameError;

    fn encode(&mut self, fields: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        dst.extend_from_slice(b"<");
        let mut first = true;
        for field in fields {
            if !first {
                dst.extend_from_slice(FIELD_SEPARATOR.as_bytes());
            }
            first = false;
            dst.extend_from_slice(field.as_ref().as_bytes());
        }
        dst.extend_from_slice(b">");
        Ok(())
    }
}

/// Canonical reply/command frame builders, so the exact field wording lives
/// in one place instead of being retyped at every call site.
pub mod frames {
    pub fn conn(name: &str) -> Vec<String> {
        vec![name.to_owned(), "CONN".to_owned()]
    }

    pub fn conn_ack() -> Vec<String> {
        vec!["CONN_ACK".to_owned()]
    }

    pub fn sub(name: &str, topic: &str) -> Vec<String> {
        vec![name.to_owned(), "SUB".to_owned(), topic.to_owned()]
    }

    pub fn sub_ack() -> Vec<String> {
        vec!["SUB_ACK".to_owned()]
    }

    pub fn sub_failed_not_found() -> Vec<String> {
        vec!["ERROR: Subscription Failed - Subject Not Found".to_owned()]
    }

    pub fn publish(name: &str, topic: &str, payload: &str) -> Vec<String> {
        vec![
            name.to_owned(),
            "PUB".to_owned(),
            topic.to_owned(),
            payload.to_owned(),
        ]
    }

    pub fn subject_not_found() -> Vec<String> {
        vec!["ERROR: Subject Not Found".to_owned()]
    }

    pub fn not_subscribed() -> Vec<String> {
        vec!["ERROR: Not Subscribed".to_owned()]
    }

    pub fn disc() -> Vec<String> {
        vec!["DISC".to_owned()]
    }

    pub fn disc_ack() -> Vec<String> {
        vec!["DISC_ACK".to_owned()]
    }
}
