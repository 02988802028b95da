//! Decoder for a byte stream of back-to-back JSON values.
//!
//! The engine writes one JSON document per event on its stdout. Values may
//! be separated by newlines, arbitrary whitespace, or nothing at all; the
//! decoder yields each top-level value in order and reports end-of-stream
//! once the input is exhausted with only whitespace left over. An object
//! or array is only handed to `serde_json` once its closing bracket has
//! arrived.

use futures::StreamExt;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};

/// Errors produced while decoding the stream. None of them is recoverable:
/// after an error the stream position is undefined.
#[derive(Debug, thiserror::Error)]
pub enum JsonStreamError {
    #[error("malformed JSON in message stream: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("message stream ended in the middle of a JSON value ({0} bytes pending)")]
    Truncated(usize),

    #[error("failed to read message stream: {0}")]
    Io(#[from] std::io::Error),
}

/// [`Decoder`] that splits a byte buffer into successive JSON values.
///
/// Objects and arrays are delimited by an incremental bracket scan that
/// resumes where the previous call stopped, so a value arriving in many
/// small reads is walked once and parsed once. Top-level scalars go
/// straight to `serde_json`.
#[derive(Debug, Default, Clone)]
pub struct JsonValueCodec {
    /// Bytes of the pending value already scanned.
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonValueCodec {
    /// Advance the scan over `buf`, returning the length of the first
    /// complete object or array once its closing bracket is seen.
    fn scan(&mut self, buf: &[u8]) -> Option<usize> {
        for (i, &byte) in buf.iter().enumerate().skip(self.scanned) {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        self.scanned = buf.len();
        None
    }
}

fn decode_scalar(src: &mut BytesMut) -> Result<Option<Value>, JsonStreamError> {
    let mut values = serde_json::Deserializer::from_slice(&src[..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => {
            let consumed = values.byte_offset();
            src.advance(consumed);
            Ok(Some(value))
        }
        // Incomplete value: wait for more bytes.
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(JsonStreamError::Malformed(e)),
        None => Ok(None),
    }
}

impl Decoder for JsonValueCodec {
    type Item = Value;
    type Error = JsonStreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, JsonStreamError> {
        if self.scanned == 0 {
            let start = src
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(src.len());
            src.advance(start);
            match src.first() {
                None => return Ok(None),
                Some(b'{' | b'[') => {}
                Some(_) => return decode_scalar(src),
            }
        }

        let Some(end) = self.scan(&src[..]) else {
            return Ok(None);
        };
        *self = Self::default();
        let frame = src.split_to(end);
        serde_json::from_slice(&frame)
            .map(Some)
            .map_err(JsonStreamError::Malformed)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Value>, JsonStreamError> {
        match self.decode(src)? {
            Some(value) => Ok(Some(value)),
            None if src.iter().all(u8::is_ascii_whitespace) => {
                src.clear();
                Ok(None)
            }
            None => Err(JsonStreamError::Truncated(src.len())),
        }
    }
}

/// Lazy sequence of JSON values read from an async byte stream.
pub struct JsonStream<R> {
    frames: FramedRead<R, JsonValueCodec>,
}

impl<R: AsyncRead + Unpin> JsonStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            frames: FramedRead::new(reader, JsonValueCodec::default()),
        }
    }

    /// Wait for the next complete value.
    ///
    /// Returns `Ok(None)` once the underlying stream is exhausted with no
    /// value pending.
    pub async fn read(&mut self) -> Result<Option<Value>, JsonStreamError> {
        self.frames.next().await.transpose()
    }
}

impl<R> std::fmt::Debug for JsonStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStream")
            .field("buffered", &self.frames.read_buffer().len())
            .finish()
    }
}
