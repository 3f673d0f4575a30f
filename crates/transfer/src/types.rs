use std::path::PathBuf;

use crate::{ChunkId, Manifest};

/// A chunk of file data read from the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Content address of `data`.
    pub id: ChunkId,
    /// Byte offset within the source stream.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Result of a completed split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    /// The manifest as written to the store.
    pub manifest: Manifest,
    /// Total bytes consumed from the input.
    pub total_bytes: u64,
}

/// Result of a completed reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Final location of the reconstructed file.
    pub path: PathBuf,
    pub file_name: String,
    /// Number of manifest records merged (repeated ids count each time).
    pub chunks: usize,
    pub bytes: u64,
}
