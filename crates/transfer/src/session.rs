use std::path::{Path, PathBuf};

use crate::{ChunkStore, TransferError};

/// A working directory owned by exactly one split or assemble operation.
///
/// Each session lives in its own `root/<id>` directory, so concurrent
/// operations never touch each other's chunk stores. Nothing here locks;
/// isolation comes from never handing the same id to two operations.
#[derive(Debug)]
pub struct Session {
    id: String,
    dir: PathBuf,
}

impl Session {
    /// Creates a fresh session directory with a random id under `root`.
    pub fn create(root: &Path) -> Result<Self, TransferError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = root.join(&id);
        std::fs::create_dir_all(&dir).map_err(TransferError::storage("create directory", &dir))?;
        tracing::debug!(session = %id, dir = %dir.display(), "session created");
        Ok(Self { id, dir })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chunk store backed by the session directory.
    pub fn store(&self) -> Result<ChunkStore, TransferError> {
        ChunkStore::open(&self.dir)
    }

    /// Deletes the session directory and everything in it.
    pub fn remove(self) -> Result<(), TransferError> {
        std::fs::remove_dir_all(&self.dir)
            .map_err(TransferError::storage("remove directory", &self.dir))?;
        tracing::debug!(session = %self.id, "session removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sessions_are_isolated() {
        let root = TempDir::new().unwrap();
        let a = Session::create(root.path()).unwrap();
        let b = Session::create(root.path()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert!(b.dir().is_dir());
    }

    #[test]
    fn remove_deletes_directory() {
        let root = TempDir::new().unwrap();
        let session = Session::create(root.path()).unwrap();
        let dir = session.dir().to_path_buf();
        std::fs::write(dir.join("links.txt"), "x\n").unwrap();
        session.remove().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn store_lives_in_session_dir() {
        let root = TempDir::new().unwrap();
        let session = Session::create(root.path()).unwrap();
        let store = session.store().unwrap();
        assert_eq!(store.root(), session.dir());
    }
}
