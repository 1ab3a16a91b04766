use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use super::RespValue;

/// Maximum nesting depth accepted for arrays
const MAX_DEPTH: usize = 8;

/// Errors during RESP parsing
#[derive(Debug, Error)]
pub enum RespCodecError {
    #[error("unknown frame type byte: {0:#04x}")]
    UnknownType(u8),

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("frame nested too deeply")]
    TooDeep,

    #[error("frame too large: {size} bytes")]
    FrameTooLarge { size: usize },
}

/// Sans-IO RESP2 codec
///
/// Feed bytes with `feed()`, pull complete frames with `decode()`.
pub struct RespCodec {
    /// Internal buffer for partial data
    buffer: BytesMut,
    /// Maximum buffered size (default 1MB)
    max_size: usize,
}

impl RespCodec {
    /// Create a new codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_size: 1024 * 1024, // 1MB
        }
    }

    /// Set maximum buffered size
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Feed bytes into the codec
    ///
    /// # Errors
    /// Returns `RespCodecError::FrameTooLarge` if the buffer exceeds `max_size`.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), RespCodecError> {
        if self.buffer.len() + bytes.len() > self.max_size {
            return Err(RespCodecError::FrameTooLarge {
                size: self.buffer.len() + bytes.len(),
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Try to decode one complete frame
    ///
    /// Returns `Ok(None)` if more data is needed.
    ///
    /// # Errors
    /// Returns `RespCodecError` if the buffered data is not valid RESP.
    pub fn decode(&mut self) -> Result<Option<RespValue>, RespCodecError> {
        match parse_at(&self.buffer, 0, 0)? {
            Some((value, consumed)) => {
                self.buffer.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Number of bytes waiting to be decoded
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial data
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a command as an array of bulk strings
#[must_use]
pub fn encode_command<S: AsRef<[u8]>>(args: &[S]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.as_ref().len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Find the end of the line starting at `start`, returning the index of `\r`
fn find_crlf(buf: &[u8], start: usize) -> Option<usize> {
    buf.get(start..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| start + p)
}

fn parse_line(buf: &[u8], start: usize) -> Option<(String, usize)> {
    let end = find_crlf(buf, start)?;
    let line = String::from_utf8_lossy(&buf[start..end]).into_owned();
    Some((line, end + 2))
}

fn parse_int(line: &str) -> Result<i64, RespCodecError> {
    line.trim()
        .parse()
        .map_err(|_| RespCodecError::InvalidInteger(line.to_string()))
}

fn parse_length(line: &str) -> Result<Option<usize>, RespCodecError> {
    match parse_int(line).map_err(|_| RespCodecError::InvalidLength(line.to_string()))? {
        -1 => Ok(None),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| RespCodecError::InvalidLength(line.to_string())),
    }
}

/// Parse one frame at `start`, returning it with the offset just past its end
fn parse_at(
    buf: &[u8],
    start: usize,
    depth: usize,
) -> Result<Option<(RespValue, usize)>, RespCodecError> {
    if depth > MAX_DEPTH {
        return Err(RespCodecError::TooDeep);
    }

    let Some(&kind) = buf.get(start) else {
        return Ok(None);
    };
    if !matches!(kind, b'+' | b'-' | b':' | b'$' | b'*') {
        return Err(RespCodecError::UnknownType(kind));
    }
    let Some((line, after_line)) = parse_line(buf, start + 1) else {
        return Ok(None);
    };

    match kind {
        b'+' => Ok(Some((RespValue::SimpleString(line), after_line))),
        b'-' => Ok(Some((RespValue::Error(line), after_line))),
        b':' => Ok(Some((RespValue::Integer(parse_int(&line)?), after_line))),
        b'$' => {
            let Some(len) = parse_length(&line)? else {
                return Ok(Some((RespValue::Null, after_line)));
            };
            let end = after_line + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(RespCodecError::InvalidLength(line));
            }
            let data = Bytes::copy_from_slice(&buf[after_line..end]);
            Ok(Some((RespValue::BulkString(data), end + 2)))
        }
        b'*' => {
            let Some(count) = parse_length(&line)? else {
                return Ok(Some((RespValue::Null, after_line)));
            };
            let mut items = Vec::with_capacity(count.min(64));
            let mut pos = after_line;
            for _ in 0..count {
                match parse_at(buf, pos, depth + 1)? {
                    Some((item, next)) => {
                        items.push(item);
                        pos = next;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(items), pos)))
        }
        _ => Err(RespCodecError::UnknownType(kind)),
    }
}
