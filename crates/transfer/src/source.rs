//! Where an [`Assembler`](crate::Assembler) fetches artifacts from.
//!
//! The transport itself is outside this crate: the server crate provides an
//! HTTP source, and [`DirSource`] reads a local directory laid out the same
//! way (useful for tests and for reassembling from a mounted share).

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

/// Errors raised while fetching an artifact.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected status {status} for {location}")]
    Status { status: u16, location: String },

    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A base location from which artifacts can be fetched by name.
pub trait ChunkSource {
    /// Opens the artifact `name` (`links.txt` or `<hex>.zip`) as a stream.
    ///
    /// Must fail rather than return a body when the remote side does not
    /// report success.
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError>;

    /// Human-readable base location, for logs.
    fn describe(&self) -> String;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &S {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        (**self).open(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Joins an artifact name onto a base location with exactly one `/`.
pub fn join_base(base: &str, name: &str) -> String {
    format!("{}/{name}", base.trim_end_matches('/'))
}

/// Serves artifacts from a local directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ChunkSource for DirSource {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        let path = self.root.join(name);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            // Report a missing artifact the way a web server would.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::Status {
                status: 404,
                location: path.display().to_string(),
            }),
            Err(e) => Err(SourceError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
