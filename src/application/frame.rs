//! # Frame Decoder
//!
//! Docker multiplexes stdout/stderr of non-TTY attach and exec streams by
//! prefixing every chunk with an 8 byte header:
//!
//! ```text
//! [stream: u8][0, 0, 0][len: u32 big-endian][payload; len]
//! ```
//!
//! The helpers here turn an accumulated exec buffer back into plain text.

use bytes::Buf;

use crate::domain::error::BridgeError;

pub const HEADER_LEN: usize = 8;

/// Smallest buffer `decode` accepts: a header plus at least the trailing newline.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub stream: StreamKind,
    pub len: usize,
}

impl FrameHeader {
    /// Parses a header from the first eight bytes of `buf`.
    /// Returns `None` for short buffers or bytes that do not look like a header.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let stream = match buf[0] {
            0 => StreamKind::Stdin,
            1 => StreamKind::Stdout,
            2 => StreamKind::Stderr,
            _ => return None,
        };
        if buf[1..4] != [0, 0, 0] {
            return None;
        }
        let mut len_bytes = &buf[4..8];
        let len = len_bytes.get_u32() as usize;
        Some(Self { stream, len })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = match self.stream {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        };
        out[4..].copy_from_slice(&(self.len as u32).to_be_bytes());
        out
    }
}

/// Splits a buffer made entirely of complete frames into their payloads.
/// Returns `None` as soon as the buffer stops looking like a frame sequence.
pub fn demultiplex(mut buf: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(buf.len());
    while !buf.is_empty() {
        let header = FrameHeader::parse(buf)?;
        let end = HEADER_LEN.checked_add(header.len)?;
        if buf.len() < end {
            return None;
        }
        out.extend_from_slice(&buf[HEADER_LEN..end]);
        buf = &buf[end..];
    }
    Some(out)
}

/// Decodes one accumulated exec buffer.
///
/// A buffer made of well formed frames has every header removed. Anything
/// else only loses its leading header. Either way one trailing newline is
/// dropped.
pub fn decode(buf: &[u8]) -> Result<String, BridgeError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(BridgeError::Decode {
            len: buf.len(),
            min: MIN_FRAME_LEN,
        });
    }

    let payload = match demultiplex(buf) {
        Some(bytes) => bytes,
        None => buf[HEADER_LEN..].to_vec(),
    };
    let payload = payload.strip_suffix(b"\n").unwrap_or(&payload);

    Ok(String::from_utf8_lossy(payload).into_owned())
}
