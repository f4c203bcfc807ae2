//! Line decoder for inbound client traffic.
//!
//! Splits the byte stream on `\n` with two guarantees the plain `LinesCodec`
//! does not give:
//! - bytes that are not valid UTF-8 are replaced, never an error
//! - a line over the length limit is skipped as it streams in, so a client
//!   that never sends `\n` cannot grow the buffer past the limit
//!
//! The decoder itself never fails, so a `FramedRead` over it only ends on
//! end of stream or a transport error.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// A complete line without its `\n` (a trailing `\r` is kept).
    Line(String),

    /// A line longer than the limit was discarded; carries its length in
    /// bytes, excluding the `\n`.
    Oversized(usize),
}

/// Newline-delimited decoder with a maximum line length.
#[derive(Debug, Clone)]
pub struct RelayLineCodec {
    /// Index of next byte to check for newline
    next_index: usize,

    /// Maximum line length in bytes, excluding the `\n`
    max_length: usize,

    /// Bytes of an oversized line discarded so far, if inside one
    discarding: Option<usize>,
}

impl RelayLineCodec {
    /// Creates a decoder that skips lines longer than `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            discarding: None,
        }
    }

    /// Maximum accepted line length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn finish_line(&self, raw: &[u8]) -> InboundLine {
        if raw.len() > self.max_length {
            InboundLine::Oversized(raw.len())
        } else {
            InboundLine::Line(String::from_utf8_lossy(raw).into_owned())
        }
    }
}

impl Decoder for RelayLineCodec {
    type Item = InboundLine;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, std::io::Error> {
        if let Some(discarded) = self.discarding {
            return match src.iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    src.advance(offset + 1);
                    self.discarding = None;
                    self.next_index = 0;
                    Ok(Some(InboundLine::Oversized(discarded + offset)))
                }
                None => {
                    self.discarding = Some(discarded + src.len());
                    src.clear();
                    Ok(None)
                }
            };
        }

        match src[self.next_index..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.next_index + offset;
                let line = src.split_to(end + 1);
                self.next_index = 0;
                Ok(Some(self.finish_line(&line[..end])))
            }
            None if src.len() > self.max_length => {
                // Over the limit before the newline: stop buffering
                self.discarding = Some(src.len());
                self.next_index = 0;
                src.clear();
                Ok(None)
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, std::io::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        // Final line without a terminating newline
        if let Some(discarded) = self.discarding.take() {
            return Ok(Some(InboundLine::Oversized(discarded)));
        }
        if src.is_empty() {
            return Ok(None);
        }

        self.next_index = 0;
        let line = src.split();
        Ok(Some(self.finish_line(&line)))
    }
}
