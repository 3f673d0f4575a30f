//! Wire-level constants and JSON bodies of the chunkferry service.
//!
//! Kept separate from the transfer core so that producers and consumers that
//! only speak the wire format do not pull in the chunking machinery.

pub mod constants;
pub mod messages;

pub use constants::{
    CHUNK_EXTENSION, DEFAULT_CHUNK_SIZE, DEFAULT_PORT, MANIFEST_FILE_NAME, UPLOAD_FIELD,
};
pub use messages::{DownloadQuery, ErrorResponse, StatusResponse, UploadResponse};
