//! Pulls fixed-size chunk+spare records from a byte source, tolerating
//! short/interrupted reads and draining a look-ahead buffer handed off by
//! the layout detector before falling back to the source itself.

use std::io::{ErrorKind, Read};

use crate::error::{Result, Yaffs2Error};

pub const MAX_CHUNK_SIZE: usize = 16384;
pub const MAX_SPARE_SIZE: usize = 512;

pub struct ImageReader {
    source: Box<dyn Read>,
    chunk_size: usize,
    spare_size: usize,
    lookahead: Vec<u8>,
    lookahead_pos: usize,
    chunk_no: u64,
}

impl ImageReader {
    /// `lookahead` is whatever the layout detector already pulled off the
    /// source; it is replayed before any further bytes are read.
    pub fn new(
        source: Box<dyn Read>,
        chunk_size: u32,
        spare_size: u32,
        lookahead: Vec<u8>,
    ) -> Self {
        ImageReader {
            source,
            chunk_size: chunk_size as usize,
            spare_size: spare_size as usize,
            lookahead,
            lookahead_pos: 0,
            chunk_no: 0,
        }
    }

    pub fn chunk_no(&self) -> u64 {
        self.chunk_no
    }

    /// Fills `buf` fully, draining the look-ahead buffer first. Retries on
    /// `ErrorKind::Interrupted` and on short reads. Returns the number of
    /// bytes actually obtained before end-of-stream (0 means the stream
    /// never yielded anything at all for this call).
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining_lookahead = self.lookahead.len() - self.lookahead_pos;
            if remaining_lookahead > 0 {
                let n = remaining_lookahead.min(buf.len() - filled);
                let start = self.lookahead_pos;
                buf[filled..filled + n].copy_from_slice(&self.lookahead[start..start + n]);
                self.lookahead_pos += n;
                filled += n;
                continue;
            }
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Yaffs2Error::output("reading image", e)),
            }
        }
        Ok(filled)
    }

    /// Reads the next chunk+spare record. `Ok(None)` is a clean end of
    /// stream; a partial record is `TruncatedImage`.
    pub fn next_chunk(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let total = self.chunk_size + self.spare_size;
        let mut buf = vec![0u8; total];
        let filled = self.fill(&mut buf)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled != total {
            return Err(Yaffs2Error::TruncatedImage);
        }
        self.chunk_no += 1;
        let spare = buf.split_off(self.chunk_size);
        Ok(Some((buf, spare)))
    }
}
