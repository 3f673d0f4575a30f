use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::source::{ChunkSource, SourceError};
use crate::types::Assembled;
use crate::{ChunkId, ChunkStore, MANIFEST_FILE_NAME, Manifest, TransferError, validate_upload_path};

/// Copy buffer for chunk downloads and merging.
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Rebuilds a file from a manifest and the chunks it names.
///
/// Steps, all sequential: fetch the manifest, fetch every chunk into the
/// scratch store in manifest order, merge in manifest order, clean up.
/// The first failure aborts the rest.
pub struct Assembler<S> {
    source: S,
    scratch: ChunkStore,
    output_dir: PathBuf,
    verify: bool,
}

impl<S: ChunkSource> Assembler<S> {
    /// `scratch` receives the downloaded chunks; the rebuilt file is written
    /// to `output_dir`.
    pub fn new(source: S, scratch: ChunkStore, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            scratch,
            output_dir: output_dir.into(),
            verify: true,
        }
    }

    /// Whether each downloaded chunk is re-hashed against its id (default on).
    pub fn verify_chunks(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Runs all steps.
    pub fn run(&self) -> Result<Assembled, TransferError> {
        let manifest = self.fetch_manifest()?;
        self.fetch_chunks(&manifest)?;
        let assembled = self.merge(&manifest)?;
        self.cleanup(&manifest);
        Ok(assembled)
    }

    /// Fetches and decodes `links.txt` from the source.
    pub fn fetch_manifest(&self) -> Result<Manifest, TransferError> {
        let body = self
            .source
            .open(MANIFEST_FILE_NAME)
            .map_err(TransferError::ManifestFetch)?;
        let manifest = Manifest::decode(BufReader::new(body))?;
        tracing::info!(
            source = %self.source.describe(),
            file = %manifest.file_name,
            chunks = manifest.len(),
            "manifest fetched"
        );
        Ok(manifest)
    }

    /// Downloads every chunk the manifest names into the scratch store.
    pub fn fetch_chunks(&self, manifest: &Manifest) -> Result<(), TransferError> {
        let total = manifest.len();
        for (index, raw) in manifest.chunks.iter().enumerate() {
            let position = index + 1;
            let id = ChunkId::parse(raw).map_err(|_| TransferError::InvalidChunkRef {
                id: raw.clone(),
                position,
            })?;
            let bytes = self.fetch_chunk(&id, position, total)?;
            tracing::debug!(%id, position, total, bytes, "chunk downloaded");
        }
        Ok(())
    }

    fn fetch_chunk(&self, id: &ChunkId, position: usize, total: usize) -> Result<u64, TransferError> {
        let fetch_err = |source: SourceError| TransferError::ChunkFetch {
            id: id.to_string(),
            position,
            total,
            source,
        };

        let mut body = self.source.open(&id.artifact_name()).map_err(fetch_err)?;
        let mut staged = self.scratch.stage(id)?;
        let mut hasher = self.verify.then(|| id.algorithm().hasher());
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied = 0u64;

        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    staged.abort();
                    return Err(fetch_err(SourceError::Io(e)));
                }
            };
            if let Err(e) = staged.writer().write_all(&buf[..n]) {
                let path = staged.staging_path().to_path_buf();
                staged.abort();
                return Err(TransferError::storage("write chunk", path)(e));
            }
            if let Some(h) = hasher.as_mut() {
                h.update(&buf[..n]);
            }
            copied += n as u64;
        }

        if let Some(h) = hasher {
            if !id.matches_hex(&h.finalize_hex()) {
                staged.abort();
                return Err(TransferError::ChecksumMismatch {
                    id: id.to_string(),
                    position,
                });
            }
        }

        staged.commit()?;
        Ok(copied)
    }

    /// Concatenates the scratch chunks in manifest order into the output file.
    ///
    /// Each record re-opens its chunk by id, so a repeated id is read once
    /// per occurrence. Directory listing order is never consulted. The
    /// output is staged inside the scratch store, which belongs to this
    /// assembler alone, and moved into `output_dir` only when every chunk
    /// has been copied.
    pub fn merge(&self, manifest: &Manifest) -> Result<Assembled, TransferError> {
        validate_upload_path(&manifest.file_name)?;

        let final_path = self.output_dir.join(&manifest.file_name);
        let parent = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_dir.clone());
        std::fs::create_dir_all(&parent).map_err(TransferError::storage("create directory", &parent))?;

        let part_path = self.part_path(&final_path);
        let file = File::create(&part_path).map_err(TransferError::storage("create output", &part_path))?;

        let merged = self
            .merge_into(manifest, BufWriter::new(file), &part_path)
            .and_then(|bytes| finalize(&part_path, &final_path).map(|()| bytes));
        match merged {
            Ok(bytes) => {
                tracing::info!(
                    file = %manifest.file_name,
                    path = %final_path.display(),
                    chunks = manifest.len(),
                    bytes,
                    "file reassembled"
                );
                Ok(Assembled {
                    path: final_path,
                    file_name: manifest.file_name.clone(),
                    chunks: manifest.len(),
                    bytes,
                })
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&part_path) {
                    tracing::warn!(path = %part_path.display(), "failed to remove partial output: {rm}");
                }
                Err(e)
            }
        }
    }

    fn merge_into(
        &self,
        manifest: &Manifest,
        mut out: BufWriter<File>,
        out_path: &Path,
    ) -> Result<u64, TransferError> {
        let mut bytes = 0u64;
        for (index, raw) in manifest.chunks.iter().enumerate() {
            let id = ChunkId::parse(raw).map_err(|_| TransferError::InvalidChunkRef {
                id: raw.clone(),
                position: index + 1,
            })?;
            let mut chunk = self.scratch.open_chunk(&id)?;
            bytes += io::copy(&mut chunk, &mut out)
                .map_err(TransferError::storage("merge chunk into", out_path))?;
        }
        out.flush()
            .map_err(TransferError::storage("write output", out_path))?;
        out.get_ref()
            .sync_all()
            .map_err(TransferError::storage("sync output", out_path))?;
        Ok(bytes)
    }

    /// Scratch location of the output while it is being merged.
    fn part_path(&self, final_path: &Path) -> PathBuf {
        self.scratch
            .root()
            .join(format!(".{}.part", file_name_of(final_path)))
    }

    /// Removes the downloaded chunks from the scratch store.
    ///
    /// Failures are logged and otherwise ignored: the rebuilt file is valid
    /// whether or not the scratch copies go away.
    pub fn cleanup(&self, manifest: &Manifest) {
        let mut seen = HashSet::new();
        for raw in &manifest.chunks {
            let Ok(id) = ChunkId::parse(raw) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Err(e) = self.scratch.remove_chunk(&id) {
                tracing::warn!(%id, "failed to remove scratch chunk: {e}");
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Moves a fully merged file from the scratch store to its final name.
///
/// A plain rename when both sit on one filesystem. Otherwise the file is
/// copied to a uniquely named sibling of the target first, so the final
/// name still only ever appears complete.
fn finalize(part_path: &Path, final_path: &Path) -> Result<(), TransferError> {
    match std::fs::rename(part_path, final_path) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {}
        Err(e) => return Err(TransferError::storage("rename output", part_path)(e)),
    }

    let sibling = final_path.with_file_name(format!(
        ".{}.{}.part",
        file_name_of(final_path),
        uuid::Uuid::new_v4()
    ));
    let moved = std::fs::copy(part_path, &sibling)
        .map_err(TransferError::storage("copy output", &sibling))
        .and_then(|_| {
            std::fs::rename(&sibling, final_path)
                .map_err(TransferError::storage("rename output", &sibling))
        });
    if moved.is_err() {
        if let Err(rm) = std::fs::remove_file(&sibling) {
            tracing::warn!(path = %sibling.display(), "failed to remove partial output: {rm}");
        }
        return moved;
    }
    if let Err(rm) = std::fs::remove_file(part_path) {
        tracing::warn!(path = %part_path.display(), "failed to remove merged scratch file: {rm}");
    }
    Ok(())
}
