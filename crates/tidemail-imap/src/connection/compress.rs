//! COMPRESS=DEFLATE stream codec (RFC 4978).
//!
//! The extension wraps both directions of the connection in raw deflate
//! streams (no zlib header). Each outgoing write is sync-flushed so the
//! server can decode a complete command without waiting for more input.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::{Error, Result};

const CHUNK: usize = 8 * 1024;

/// Stateful deflate codec for one connection.
///
/// Both directions keep their dictionary for the connection's lifetime;
/// a fresh codec is only installed once, after the server confirms
/// `COMPRESS DEFLATE`.
pub struct DeflateCodec {
    compress: Compress,
    decompress: Decompress,
}

impl std::fmt::Debug for DeflateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateCodec").finish_non_exhaustive()
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl DeflateCodec {
    /// Creates a codec with fresh dictionaries. `false` selects raw deflate
    /// without the zlib envelope, as RFC 4978 requires.
    #[must_use]
    pub fn new() -> Self {
        Self {
            compress: Compress::new(Compression::default(), false),
            decompress: Decompress::new(false),
        }
    }

    /// Compresses one outgoing write, sync-flushed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the compressor reports corruption,
    /// which cannot normally happen for a healthy stream.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2 + 64);
        let start_in = self.compress.total_in();

        loop {
            if output.capacity() == output.len() {
                output.reserve(CHUNK);
            }
            #[allow(clippy::cast_possible_truncation)]
            let consumed = (self.compress.total_in() - start_in) as usize;
            let status = self
                .compress
                .compress_vec(&input[consumed..], &mut output, FlushCompress::Sync)
                .map_err(|e| Error::Protocol(format!("deflate failed: {e}")))?;

            #[allow(clippy::cast_possible_truncation)]
            let consumed = (self.compress.total_in() - start_in) as usize;
            let flushed = output.len() < output.capacity();
            match status {
                Status::Ok | Status::BufError => {
                    if consumed == input.len() && flushed {
                        return Ok(output);
                    }
                }
                Status::StreamEnd => return Ok(output),
            }
        }
    }

    /// Inflates one chunk of incoming bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on a corrupt deflate stream; the
    /// connection is torn down by the caller.
    pub fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 2 + 64);
        let start_in = self.decompress.total_in();

        loop {
            if output.capacity() == output.len() {
                output.reserve(CHUNK);
            }
            #[allow(clippy::cast_possible_truncation)]
            let consumed = (self.decompress.total_in() - start_in) as usize;
            let status = self
                .decompress
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
                .map_err(|e| Error::Protocol(format!("inflate failed: {e}")))?;

            #[allow(clippy::cast_possible_truncation)]
            let consumed = (self.decompress.total_in() - start_in) as usize;
            match status {
                Status::Ok | Status::BufError => {
                    if consumed == input.len() && output.len() < output.capacity() {
                        return Ok(output);
                    }
                    if matches!(status, Status::BufError) && consumed == input.len() {
                        // Decoder wants more input; everything available is
                        // consumed.
                        return Ok(output);
                    }
                }
                Status::StreamEnd => return Ok(output),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_single_write() {
        let mut tx = DeflateCodec::new();
        let mut rx = DeflateCodec::new();

        let wire = tx.compress(b"A1 NOOP\r\n").unwrap();
        assert!(!wire.is_empty());
        let plain = rx.decompress(&wire).unwrap();
        assert_eq!(plain, b"A1 NOOP\r\n");
    }

    #[test]
    fn keeps_dictionary_across_writes() {
        let mut tx = DeflateCodec::new();
        let mut rx = DeflateCodec::new();

        let mut decoded = Vec::new();
        for i in 0..10 {
            let line = format!("A{i} SELECT INBOX\r\n");
            let wire = tx.compress(line.as_bytes()).unwrap();
            decoded.extend(rx.decompress(&wire).unwrap());
        }
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("A0 SELECT INBOX\r\n"));
        assert!(text.ends_with("A9 SELECT INBOX\r\n"));
    }

    #[test]
    fn round_trips_large_payload() {
        let mut tx = DeflateCodec::new();
        let mut rx = DeflateCodec::new();

        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let wire = tx.compress(&payload).unwrap();
        let plain = rx.decompress(&wire).unwrap();
        assert_eq!(plain, payload);
    }

    #[test]
    fn decompress_handles_split_input() {
        let mut tx = DeflateCodec::new();
        let mut rx = DeflateCodec::new();

        let wire = tx.compress(b"* 1 EXISTS\r\n").unwrap();
        let (a, b) = wire.split_at(wire.len() / 2);
        let mut plain = rx.decompress(a).unwrap();
        plain.extend(rx.decompress(b).unwrap());
        assert_eq!(plain, b"* 1 EXISTS\r\n");
    }

    #[test]
    fn garbage_input_is_rejected() {
        let mut rx = DeflateCodec::new();
        // Feed enough nonsense that the inflater must choke.
        let garbage = vec![0xff; 64];
        assert!(rx.decompress(&garbage).is_err());
    }
}
