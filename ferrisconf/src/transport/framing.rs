//! NETCONF message framing.
//!
//! NETCONF 1.0 terminates each message with `]]>]]>` (RFC 4742). NETCONF
//! 1.1 sends messages as length-prefixed chunks closed by `\n##\n`
//! (RFC 6242). The hello exchange always uses end-of-message framing.

use bytes::{Buf, BytesMut};
use memchr::memmem;

/// End-of-message delimiter for NETCONF 1.0.
pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";

/// Largest chunk size allowed by RFC 6242.
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Framing mode negotiated for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `]]>]]>` delimited (base:1.0).
    #[default]
    EndOfMessage,
    /// Chunked (base:1.1).
    Chunked,
}

/// Frame a message for sending.
pub fn encode(message: &str, framing: Framing) -> Vec<u8> {
    match framing {
        Framing::EndOfMessage => {
            let mut out = Vec::with_capacity(message.len() + END_OF_MESSAGE.len());
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(END_OF_MESSAGE);
            out
        }
        Framing::Chunked => {
            let header = format!("\n#{}\n", message.len());
            let mut out = Vec::with_capacity(header.len() + message.len() + 4);
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(b"\n##\n");
            out
        }
    }
}

/// Accumulates received bytes and yields complete messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a decoder starting in end-of-message mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch framing mode (after the hello exchange).
    pub fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    /// Current framing mode.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered, not yet decoded bytes.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete message, if one is buffered.
    pub fn next_message(&mut self) -> Result<Option<String>, String> {
        match self.framing {
            Framing::EndOfMessage => Ok(self.next_eom_message()),
            Framing::Chunked => self.next_chunked_message(),
        }
    }

    fn next_eom_message(&mut self) -> Option<String> {
        let end = memmem::find(&self.buffer, END_OF_MESSAGE)?;
        let frame = self.buffer.split_to(end);
        self.buffer.advance(END_OF_MESSAGE.len());
        Some(String::from_utf8_lossy(&frame).trim().to_string())
    }

    fn next_chunked_message(&mut self) -> Result<Option<String>, String> {
        // Parse without consuming until the end-of-chunks marker is seen.
        let buf = &self.buffer[..];
        let mut pos = 0;
        let mut message = Vec::new();

        // Tolerate stray whitespace left after the previous message.
        while pos < buf.len() && matches!(buf[pos], b'\r' | b' ' | b'\t') {
            pos += 1;
        }

        loop {
            if buf.len() < pos + 3 {
                return Ok(None);
            }
            if buf[pos] != b'\n' || buf[pos + 1] != b'#' {
                return Err(format!("invalid chunk header at offset {pos}"));
            }

            if buf[pos + 2] == b'#' {
                if buf.len() < pos + 4 {
                    return Ok(None);
                }
                if buf[pos + 3] != b'\n' {
                    return Err("invalid end-of-chunks marker".to_string());
                }
                self.buffer.advance(pos + 4);
                return Ok(Some(String::from_utf8_lossy(&message).trim().to_string()));
            }

            let digits_start = pos + 2;
            let Some(newline) = memchr::memchr(b'\n', &buf[digits_start..]) else {
                // Chunk sizes have at most 10 digits.
                if buf.len() - digits_start > 10 {
                    return Err("chunk size too long".to_string());
                }
                return Ok(None);
            };
            let digits = &buf[digits_start..digits_start + newline];
            let size = parse_chunk_size(digits)?;
            let data_start = digits_start + newline + 1;
            let data_end = data_start + size;
            if buf.len() < data_end {
                return Ok(None);
            }
            message.extend_from_slice(&buf[data_start..data_end]);
            pos = data_end;
        }
    }
}

fn parse_chunk_size(digits: &[u8]) -> Result<usize, String> {
    let text = std::str::from_utf8(digits).map_err(|_| "non-ASCII chunk size".to_string())?;
    if text.is_empty() || text.starts_with('0') || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid chunk size '{text}'"));
    }
    let size: u64 = text
        .parse()
        .map_err(|_| format!("invalid chunk size '{text}'"))?;
    if size > MAX_CHUNK_SIZE {
        return Err(format!("chunk size {size} exceeds maximum"));
    }
    usize::try_from(size).map_err(|_| format!("chunk size {size} exceeds address space"))
}
