use std::io::Read;

use crate::digest::DigestAlgorithm;
use crate::types::Chunk;
use crate::{ChunkId, DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a stream in fixed-size, content-addressed chunks.
///
/// Every chunk except the last is exactly `chunk_size` bytes long, however
/// the underlying reader fragments its reads, so the same bytes always cut
/// into the same chunks.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    algorithm: DigestAlgorithm,
    offset: u64,
    exhausted: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Wraps `reader` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (50 MiB) is used.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            reader,
            chunk_size,
            algorithm: DigestAlgorithm::default(),
            offset: 0,
            exhausted: false,
        }
    }

    /// Selects the digest used for chunk ids.
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Reads the next chunk. Returns `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)
            .map_err(TransferError::Input)?;

        // A short fill means the stream hit EOF.
        if n < self.chunk_size {
            self.exhausted = true;
        }
        if n == 0 {
            return Ok(None);
        }

        let chunk = Chunk {
            id: ChunkId::of(self.algorithm, &buf),
            offset: self.offset,
            data: buf,
        };
        self.offset += n as u64;
        Ok(Some(chunk))
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
