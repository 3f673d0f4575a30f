use std::io::Read;
use std::path::Path;

use crate::chunked::ChunkReader;
use crate::types::SplitSummary;
use crate::{ChunkStore, DEFAULT_CHUNK_SIZE, DigestAlgorithm, Manifest, ManifestWriter, TransferError};

/// Cuts a byte stream into content-addressed chunks and records a manifest.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    chunk_size: usize,
    algorithm: DigestAlgorithm,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Splitter {
    /// Creates a splitter with the given chunk bound (0 selects the default).
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
            algorithm: DigestAlgorithm::default(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Splits `input` into `store`, overwriting the store's manifest.
    ///
    /// The header is written before any chunk, and each chunk is persisted
    /// before its id is appended, so manifest order equals read order. On
    /// error the manifest may hold a prefix of the chunk list; it is only
    /// valid once this returns `Ok`.
    pub fn split<R: Read>(
        &self,
        input: R,
        file_name: &str,
        store: &ChunkStore,
    ) -> Result<SplitSummary, TransferError> {
        let manifest_path = store.manifest_path();

        let mut writer = ManifestWriter::new(store.create_manifest()?, file_name)
            .map_err(|e| into_storage(e, &manifest_path))?;
        let mut manifest = Manifest::new(file_name);
        let mut reader = ChunkReader::new(input, self.chunk_size).with_algorithm(self.algorithm);

        while let Some(chunk) = reader.next_chunk()? {
            store.put(&chunk)?;
            writer
                .append(chunk.id.as_str())
                .map_err(|e| into_storage(e, &manifest_path))?;
            tracing::debug!(
                file = %file_name,
                position = manifest.len() + 1,
                offset = chunk.offset,
                size = chunk.size(),
                id = %chunk.id,
                "chunk stored"
            );
            manifest.push(chunk.id.as_str());
        }

        writer.finish().map_err(|e| into_storage(e, &manifest_path))?;

        let total_bytes = reader.offset();
        tracing::info!(
            file = %file_name,
            chunks = manifest.len(),
            bytes = total_bytes,
            store = %store.root().display(),
            "file split"
        );

        Ok(SplitSummary {
            manifest,
            total_bytes,
        })
    }
}

/// Attaches the manifest path to raw I/O failures from the writer.
fn into_storage(err: TransferError, manifest_path: &Path) -> TransferError {
    match err {
        TransferError::Io(source) => TransferError::Storage {
            op: "write manifest",
            path: manifest_path.to_path_buf(),
            source,
        },
        other => other,
    }
}
