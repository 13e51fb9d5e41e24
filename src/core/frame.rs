//! Incremental NDJSON frame decoding.
//!
//! The decoder consumes arbitrarily-fragmented byte chunks from a network
//! reader and emits complete, newline-terminated lines. The trailing
//! segment of every chunk is retained as carry-over until a later chunk
//! completes it, so an event split mid-object (or mid-UTF-8-character)
//! across chunk boundaries is reassembled intact.

use memchr::memchr;

/// Upper bound on retained carry-over before the decoder gives up.
///
/// An upstream that never emits a newline would otherwise grow the
/// carry-over without bound.
pub const DEFAULT_MAX_CARRY_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("carry-over exceeded {limit} bytes without a newline")]
    CarryOverflow { limit: usize },
}

/// Stateful line decoder for one stream.
///
/// Only complete lines are ever decoded as UTF-8, so a multi-byte
/// character split at a chunk boundary is completed by the next `feed`
/// before validation runs. A complete line that still fails UTF-8
/// validation is dropped with a warning; it never aborts the stream.
#[derive(Debug)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    max_carry: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_carry(DEFAULT_MAX_CARRY_BYTES)
    }

    pub fn with_max_carry(max_carry: usize) -> Self {
        Self {
            carry: Vec::new(),
            max_carry,
        }
    }

    /// Feed one chunk, returning every line it completed.
    ///
    /// Returned lines are trimmed of surrounding whitespace; empty lines
    /// are skipped. The segment after the final newline — empty or not —
    /// is retained as carry-over and never emitted.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, FrameError> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.carry) {
            let raw: Vec<u8> = self.carry.drain(..=newline_pos).collect();
            match std::str::from_utf8(&raw[..newline_pos]) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!("dropping non-UTF-8 line: {e}");
                }
            }
        }

        if self.carry.len() > self.max_carry {
            return Err(FrameError::CarryOverflow {
                limit: self.max_carry,
            });
        }

        Ok(lines)
    }

    /// Bytes currently held as carry-over.
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    /// Consume the decoder at end-of-stream.
    ///
    /// A non-empty leftover is an incomplete fragment by construction and
    /// is discarded without error.
    pub fn finish(self) {
        if !self.carry.is_empty() {
            tracing::debug!(
                bytes = self.carry.len(),
                "discarding incomplete trailing fragment at end of stream"
            );
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
