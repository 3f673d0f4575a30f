//! `chunkferry` node binary.
//!
//! ```text
//! chunkferry                                # listen on 0.0.0.0:11451, store under ./temp
//! chunkferry -c node.json                   # read a JSON config file
//! chunkferry -l 127.0.0.1:8080 -s ./data    # override listener and storage root
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunkferry_server::{ServerConfig, ServerError, TransferServer};
use tokio::task::JoinError;

#[derive(Parser)]
#[command(
    name = "chunkferry",
    version,
    about = "Split files into content-addressed chunks and move them between nodes"
)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(short, long, env = "CHUNKFERRY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address (e.g. "127.0.0.1:11451").
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the storage root directory.
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Override the chunk size in bytes.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Skip re-hashing downloaded chunks.
    #[arg(long)]
    no_verify: bool,

    /// Fallback log filter when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(addr) = self.listen {
            config.listen_addr = addr;
        }
        if let Some(root) = self.storage {
            config.storage_root = root;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if self.no_verify {
            config.verify_chunks = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_tracing(&config.log_level);

    let server = TransferServer::new(config);
    let mut runner = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    tokio::select! {
        // Stopped on its own, e.g. the address was already in use.
        joined = &mut runner => return finish(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown requested");
            server.shutdown();
        }
    }

    finish(runner.await)
}

fn finish(joined: Result<Result<(), ServerError>, JoinError>) -> Result<()> {
    joined
        .context("server task panicked")?
        .context("server failed")
}
