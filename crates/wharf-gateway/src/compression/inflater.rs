//! Streaming zlib inflater
//!
//! One inflater lives for exactly one connection. The zlib context carries
//! its dictionary across messages, so it must never be reset while the
//! socket is open.

use flate2::{Decompress, FlushDecompress, Status};

/// Every complete message ends with a sync flush marker
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Output grows in steps of this size while inflating
const OUTPUT_STEP: usize = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum InflateError {
    #[error("zlib stream is corrupt: {0}")]
    Corrupt(#[from] flate2::DecompressError),

    #[error("zlib stream made no progress with {pending} bytes pending")]
    Stalled { pending: usize },
}

/// Buffers compressed chunks until a full message is available
pub struct Inflater {
    context: Decompress,
    buffer: Vec<u8>,
}

impl Inflater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // zlib header is only present at the start of the stream
            context: Decompress::new(true),
            buffer: Vec::new(),
        }
    }

    /// Feed one socket read
    ///
    /// Returns the inflated message once the chunk completing it arrives,
    /// `None` while the message is still partial.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>, InflateError> {
        self.buffer.extend_from_slice(chunk);

        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.buffer);
        self.inflate(&input).map(Some)
    }

    /// Bytes received but not yet inflated
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Total compressed bytes consumed on this connection
    pub fn total_in(&self) -> u64 {
        self.context.total_in()
    }

    /// Total bytes produced on this connection
    pub fn total_out(&self) -> u64 {
        self.context.total_out()
    }

    fn inflate(&mut self, input: &[u8]) -> Result<Vec<u8>, InflateError> {
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).max(OUTPUT_STEP));
        let mut offset = 0;

        loop {
            if output.len() == output.capacity() {
                output.reserve(OUTPUT_STEP);
            }

            let before_in = self.context.total_in();
            let before_out = self.context.total_out();
            let status =
                self.context
                    .decompress_vec(&input[offset..], &mut output, FlushDecompress::Sync)?;
            let consumed = (self.context.total_in() - before_in) as usize;
            let produced = self.context.total_out() - before_out;
            offset += consumed;

            if status == Status::StreamEnd {
                break;
            }
            // All input consumed and room left over means the flush is done
            if offset >= input.len() && output.len() < output.capacity() {
                break;
            }
            if consumed == 0 && produced == 0 {
                return Err(InflateError::Stalled {
                    pending: input.len() - offset,
                });
            }
        }

        Ok(output)
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("pending", &self.buffer.len())
            .field("total_in", &self.context.total_in())
            .field("total_out", &self.context.total_out())
            .finish()
    }
}
