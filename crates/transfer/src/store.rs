use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::Chunk;
use crate::{CHUNK_EXTENSION, ChunkId, MANIFEST_FILE_NAME, Manifest, TransferError};

/// Suffix of artifacts that are still being written.
const STAGING_SUFFIX: &str = "tmp";

/// Flat directory of chunk artifacts plus the manifest that orders them.
///
/// Layout: `links.txt` and one `<hex>.zip` per distinct chunk. Holds the
/// chunks of exactly one file; sharing a store between two files mixes
/// their manifests.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(TransferError::storage("create directory", &root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Well-known manifest location; every split overwrites it.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    pub fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.root.join(id.artifact_name())
    }

    /// Persists a chunk under its content address.
    ///
    /// A chunk whose id is already present is rewritten with the same bytes.
    pub fn put(&self, chunk: &Chunk) -> Result<PathBuf, TransferError> {
        let mut staged = self.stage(&chunk.id)?;
        if let Err(e) = staged.writer().write_all(&chunk.data) {
            let path = staged.staging.clone();
            staged.abort();
            return Err(TransferError::storage("write chunk", path)(e));
        }
        staged.commit()
    }

    /// Opens a staging file for `id`. Nothing is visible under the final
    /// name until [`StagedChunk::commit`].
    pub(crate) fn stage(&self, id: &ChunkId) -> Result<StagedChunk, TransferError> {
        let target = self.chunk_path(id);
        let staging = self
            .root
            .join(format!("{}.{STAGING_SUFFIX}", id.artifact_name()));
        let file =
            File::create(&staging).map_err(TransferError::storage("create chunk", &staging))?;
        Ok(StagedChunk {
            file: BufWriter::new(file),
            staging,
            target,
        })
    }

    /// Opens a stored chunk for reading.
    pub fn open_chunk(&self, id: &ChunkId) -> Result<BufReader<File>, TransferError> {
        let path = self.chunk_path(id);
        let file = File::open(&path).map_err(TransferError::storage("open chunk", &path))?;
        Ok(BufReader::new(file))
    }

    pub fn remove_chunk(&self, id: &ChunkId) -> Result<(), TransferError> {
        let path = self.chunk_path(id);
        std::fs::remove_file(&path).map_err(TransferError::storage("remove chunk", &path))
    }

    /// Creates (or truncates) the manifest file.
    pub fn create_manifest(&self) -> Result<BufWriter<File>, TransferError> {
        let path = self.manifest_path();
        let file = File::create(&path).map_err(TransferError::storage("create manifest", &path))?;
        Ok(BufWriter::new(file))
    }

    /// Reads and decodes the manifest stored here.
    pub fn read_manifest(&self) -> Result<Manifest, TransferError> {
        let path = self.manifest_path();
        let file = File::open(&path).map_err(TransferError::storage("open manifest", &path))?;
        Manifest::decode(BufReader::new(file))
    }

    /// Lists the ids of all committed chunks, sorted by name.
    ///
    /// Name order says nothing about file order; reassembly follows the
    /// manifest instead.
    pub fn chunk_ids(&self) -> Result<Vec<ChunkId>, TransferError> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(TransferError::storage("list directory", &self.root))?;
        let suffix = format!(".{CHUNK_EXTENSION}");
        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(&suffix) {
                if let Ok(id) = ChunkId::parse(stem) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// A chunk artifact being written under a temporary name.
pub(crate) struct StagedChunk {
    file: BufWriter<File>,
    staging: PathBuf,
    target: PathBuf,
}

impl StagedChunk {
    pub(crate) fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.file
    }

    pub(crate) fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Flushes and moves the artifact to its final name.
    pub(crate) fn commit(mut self) -> Result<PathBuf, TransferError> {
        if let Err(e) = self.file.flush() {
            let path = self.staging.clone();
            self.abort();
            return Err(TransferError::storage("write chunk", path)(e));
        }
        let Self {
            file,
            staging,
            target,
        } = self;
        drop(file);
        std::fs::rename(&staging, &target)
            .map_err(TransferError::storage("rename chunk", &staging))?;
        Ok(target)
    }

    /// Drops the staging file.
    pub(crate) fn abort(self) {
        let Self { file, staging, .. } = self;
        drop(file);
        if let Err(e) = std::fs::remove_file(&staging) {
            tracing::warn!(path = %staging.display(), "failed to remove staging file: {e}");
        }
    }
}
