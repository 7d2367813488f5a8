//! Framed I/O: CRLF lines with literal splicing.
//!
//! IMAP responses are CRLF-terminated lines, except that a line ending in a
//! literal announcement `{n}` continues with exactly `n` raw bytes and then
//! more line text. [`FramedStream`] assembles such *logical lines* and hands
//! them to the parser in one piece.
//!
//! All buffering lives in a [`BytesMut`] owned by the stream, which makes
//! reads cancel-safe: a dropped read future leaves partial data in the
//! buffer instead of losing it.

#![allow(clippy::missing_errors_doc)]

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

use super::compress::DeflateCodec;

/// Maximum length of the textual part of a line.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MiB

/// Default cap on a single literal.
pub const DEFAULT_MAX_LITERAL: usize = 100 * 1024 * 1024; // 100 MiB

/// Framed connection with optional deflate on both directions.
pub struct FramedStream<S> {
    stream: S,
    read_buf: BytesMut,
    raw_buf: BytesMut,
    deflate: Option<DeflateCodec>,
    max_literal: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a framed stream with the default literal cap.
    pub fn new(stream: S) -> Self {
        Self::with_max_literal(stream, DEFAULT_MAX_LITERAL)
    }

    /// Creates a framed stream with a custom literal cap.
    pub fn with_max_literal(stream: S, max_literal: usize) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(8 * 1024),
            raw_buf: BytesMut::new(),
            deflate: None,
            max_literal,
        }
    }

    /// Switches both directions to deflate. One-shot; called only after the
    /// server confirmed `COMPRESS DEFLATE`.
    pub fn enable_deflate(&mut self) {
        self.deflate = Some(DeflateCodec::new());
    }

    /// Returns true when deflate is active.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.deflate.is_some()
    }

    /// Reads the next logical line, waiting for more data as needed.
    pub async fn read_logical_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(line) = self.extract_line()? {
                return Ok(line);
            }
            self.fill().await?;
        }
    }

    /// Pops a logical line if one is already buffered. Never waits; used to
    /// drain unsolicited responses before sending the next command.
    pub fn try_next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.extract_line()
    }

    /// Writes bytes, compressing when deflate is active, and flushes.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.deflate {
            Some(codec) => {
                let wire = codec.compress(data)?;
                self.stream.write_all(&wire).await?;
            }
            None => self.stream.write_all(data).await?,
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Shuts down the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn fill(&mut self) -> Result<()> {
        if self.deflate.is_some() {
            self.raw_buf.clear();
            let n = self.stream.read_buf(&mut self.raw_buf).await?;
            if n == 0 {
                return Err(Error::NoConnection("connection closed".to_string()));
            }
            // Split borrows: the codec inflates while read_buf grows.
            let raw = self.raw_buf.split();
            if let Some(codec) = &mut self.deflate {
                let plain = codec.decompress(&raw)?;
                self.read_buf.extend_from_slice(&plain);
            }
        } else {
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::NoConnection("connection closed".to_string()));
            }
        }
        Ok(())
    }

    /// Detaches one complete logical line from the buffer, if present.
    fn extract_line(&mut self) -> Result<Option<Vec<u8>>> {
        match scan_logical_line(&self.read_buf, self.max_literal)? {
            Some(end) => Ok(Some(self.read_buf.copy_to_bytes(end).to_vec())),
            None => Ok(None),
        }
    }
}

/// Finds the end of the first logical line in `buf`: CRLF-terminated text,
/// with any announced literals (and their continuation text) included.
fn scan_logical_line(buf: &[u8], max_literal: usize) -> Result<Option<usize>> {
    let mut pos = 0;
    loop {
        let Some(crlf) = find_crlf(&buf[pos..]) else {
            if buf.len() - pos > MAX_LINE_LENGTH {
                return Err(Error::Protocol("response line too long".to_string()));
            }
            return Ok(None);
        };
        if crlf > MAX_LINE_LENGTH {
            return Err(Error::Protocol("response line too long".to_string()));
        }
        let line_end = pos + crlf + 2;

        match literal_announcement(&buf[pos..pos + crlf]) {
            Some(len) => {
                if len > max_literal {
                    return Err(Error::Protocol(format!(
                        "literal too large: {len} bytes (cap {max_literal})"
                    )));
                }
                if buf.len() < line_end + len {
                    return Ok(None);
                }
                // Literal complete; keep scanning the same logical line.
                pos = line_end + len;
            }
            None => return Ok(Some(line_end)),
        }
    }
}

impl<S> FramedStream<S> {
    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Returns a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a trailing literal announcement: `{n}` or `{n+}` at line end.
fn literal_announcement(line: &[u8]) -> Option<usize> {
    if !line.ends_with(b"}") {
        return None;
    }
    let open = line.iter().rposition(|&b| b == b'{')?;
    let inner = &line[open + 1..line.len() - 1];
    let inner = inner.strip_suffix(b"+").unwrap_or(inner);
    if inner.is_empty() || !inner.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(inner).ok()?.parse().ok()
}
