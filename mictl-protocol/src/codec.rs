//! Line codec for MI framing

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Default maximum line length (16 MB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Codec splitting backend output into lines and terminating outbound commands
///
/// Decoded lines have their `\n` and any trailing `\r` removed. Invalid UTF-8
/// is replaced rather than rejected, since the backend relays whatever the
/// debugged program prints.
///
/// A line longer than the maximum is dropped up to its newline and decoding
/// resumes with the next line.
#[derive(Debug, Clone)]
pub struct MiLineCodec {
    max_length: usize,
    /// Bytes already scanned for a newline
    next_index: usize,
    /// Inside an oversized line that is being dropped
    discarding: bool,
}

impl MiLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for MiLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for MiLineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Never scan further than one byte past the longest allowed line
            let read_to = src.len().min(self.max_length.saturating_add(1));
            let newline = src[self.next_index..read_to].iter().position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end);
                    src.advance(1);
                    return Ok(Some(to_line(&line)));
                }
                (false, None) if src.len() > self.max_length => {
                    warn!(
                        max = self.max_length,
                        "Dropping backend output line over the length limit"
                    );
                    self.discarding = true;
                    self.next_index = 0;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() || self.discarding => {
                src.clear();
                self.discarding = false;
                self.next_index = 0;
                Ok(None)
            }
            None => {
                let rest = src.split_to(src.len());
                self.next_index = 0;
                Ok(Some(to_line(&rest)))
            }
        }
    }
}

impl<'a> Encoder<&'a str> for MiLineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: &'a str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if line.len() > self.max_length {
            return Err(CodecError::LineTooLong {
                size: line.len(),
                max: self.max_length,
            });
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        if !line.ends_with('\n') {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}
