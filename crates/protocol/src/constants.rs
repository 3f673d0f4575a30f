/// Name of the manifest artifact published next to the chunks.
pub const MANIFEST_FILE_NAME: &str = "links.txt";

/// Fixed suffix of every chunk artifact (`<hex-digest>.<ext>`).
///
/// The suffix is not derived from the content type; it is kept as `zip`
/// because existing producers publish chunks under that name.
pub const CHUNK_EXTENSION: &str = "zip";

/// Multipart form field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Default chunk bound: 50 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Default service port.
pub const DEFAULT_PORT: u16 = 11451;

/// Builds the artifact name of a chunk from its hex digest.
pub fn chunk_artifact_name(hex_digest: &str) -> String {
    format!("{hex_digest}.{CHUNK_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_appends_extension() {
        assert_eq!(
            chunk_artifact_name("d41d8cd98f00b204e9800998ecf8427e"),
            "d41d8cd98f00b204e9800998ecf8427e.zip"
        );
    }

    #[test]
    fn default_chunk_size_is_fifty_mebibytes() {
        assert_eq!(DEFAULT_CHUNK_SIZE, 52_428_800);
    }
}
