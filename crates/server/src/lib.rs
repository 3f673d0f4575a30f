//! HTTP surface of a chunkferry node.
//!
//! `POST /upload` splits a multipart file into a fresh chunk session and
//! publishes it under `/chunks/<id>/`. `GET /download?url=<base>` fetches
//! `<base>/links.txt` plus every chunk it names from another node and
//! rebuilds the file locally. The chunking itself lives in
//! `chunkferry-transfer`; this crate wires it to axum.

mod config;
mod error;
mod fetch;
mod handlers;
mod server;

pub use config::{ServerConfig, StorageLayout};
pub use error::ServerError;
pub use fetch::HttpSource;
pub use server::{AppState, TransferServer, build_router};
