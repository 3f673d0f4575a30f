//! Content-addressed file chunking and reassembly.
//!
//! A [`Splitter`] cuts a byte stream into fixed-size chunks, stores each one
//! in a [`ChunkStore`] under the hex digest of its bytes and records the
//! digests, in read order, in a [`Manifest`]. An [`Assembler`] fetches that
//! manifest and its chunks from a [`ChunkSource`] and concatenates them back
//! in manifest order.
//!
//! All I/O here is blocking. Async callers should drive these types from
//! `spawn_blocking`.

mod assembler;
mod chunked;
mod digest;
mod manifest;
mod session;
mod source;
mod splitter;
mod store;
mod types;
mod validation;

use std::path::PathBuf;

pub use assembler::Assembler;
pub use chunked::ChunkReader;
pub use digest::{ChunkId, DigestAlgorithm};
pub use manifest::{Manifest, ManifestWriter};
pub use session::Session;
pub use source::{ChunkSource, DirSource, SourceError, join_base};
pub use splitter::Splitter;
pub use store::ChunkStore;
pub use types::{Assembled, Chunk, SplitSummary};
pub use validation::validate_upload_path;

pub use chunkferry_protocol::{CHUNK_EXTENSION, DEFAULT_CHUNK_SIZE, MANIFEST_FILE_NAME};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read input stream: {0}")]
    Input(#[source] std::io::Error),

    #[error("failed to {op} {}: {source}", path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest format error: {0}")]
    Format(String),

    #[error("failed to fetch manifest: {0}")]
    ManifestFetch(#[source] SourceError),

    #[error("failed to download chunk {id} ({position}/{total}): {source}")]
    ChunkFetch {
        id: String,
        position: usize,
        total: usize,
        #[source]
        source: SourceError,
    },

    #[error("invalid chunk reference at position {position}: {id:?}")]
    InvalidChunkRef { id: String, position: usize },

    #[error("checksum mismatch for chunk {id} at position {position}")]
    ChecksumMismatch { id: String, position: usize },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl TransferError {
    /// Wraps a filesystem failure with the operation and path it concerned.
    pub(crate) fn storage(
        op: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl Fn(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Storage {
            op,
            path: path.clone(),
            source,
        }
    }
}
