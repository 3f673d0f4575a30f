//! Node configuration.
//!
//! Read from an optional JSON file (camelCase keys, every key optional) and
//! then overridden by command-line flags. Read-only once the server starts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use chunkferry_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use chunkferry_transfer::DigestAlgorithm;

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Upper bound on the size of one chunk, in bytes.
    pub chunk_size: usize,
    /// Directory under which every session, spool and output file lives.
    pub storage_root: PathBuf,
    /// Digest used to name chunks produced by `/upload`.
    pub digest: DigestAlgorithm,
    /// Re-hash downloaded chunks against their ids.
    pub verify_chunks: bool,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            storage_root: PathBuf::from("./temp"),
            digest: DigestAlgorithm::default(),
            verify_chunks: true,
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration file at `path`, or the defaults when no path
    /// is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            bail!("chunkSize must be greater than zero");
        }
        if self.storage_root.as_os_str().is_empty() {
            bail!("storageRoot must not be empty");
        }
        Ok(())
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.storage_root)
    }
}

/// Directories a node uses below its storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Published chunk sessions, one per upload, served under `/chunks`.
    pub uploads: PathBuf,
    /// Scratch sessions holding chunks fetched by `/download`.
    pub scratch: PathBuf,
    /// Reassembled files.
    pub downloads: PathBuf,
    /// Upload bodies being received, before they are split.
    pub incoming: PathBuf,
}

impl StorageLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            uploads: root.join("uploads"),
            scratch: root.join("scratch"),
            downloads: root.join("downloads"),
            incoming: root.join("incoming"),
        }
    }

    /// Creates every directory of the layout.
    pub fn prepare(&self) -> std::io::Result<()> {
        for dir in [&self.uploads, &self.scratch, &self.downloads, &self.incoming] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
