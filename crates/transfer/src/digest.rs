use std::fmt;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TransferError;

/// Hash function used to address chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// 128-bit MD5, 32 hex characters. Compatible with existing producers.
    #[default]
    Md5,
    /// SHA-256, 64 hex characters.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the lowercase hex digest of `data`.
    pub fn digest_hex(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Infers the algorithm from the length of a hex digest.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Returns an incremental hasher for this algorithm.
    pub(crate) fn hasher(self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(Md5::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("md5"),
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

pub(crate) enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Content address of a chunk: the hex digest of its bytes.
///
/// Two chunks with the same id hold the same bytes and are interchangeable.
/// Ids computed here are lowercase; parsed ids keep the case they were
/// recorded in, so artifact names match what the producer published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(String);

impl ChunkId {
    /// Computes the id of `data` with `algorithm`.
    pub fn of(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        Self(algorithm.digest_hex(data))
    }

    /// Parses a manifest record into an id.
    ///
    /// Accepts lowercase or uppercase hex of a known digest length. The
    /// record is kept as written.
    pub fn parse(s: &str) -> Result<Self, TransferError> {
        if s.is_empty() {
            return Err(TransferError::Format("empty chunk identifier".into()));
        }
        if DigestAlgorithm::from_hex_len(s.len()).is_none() {
            return Err(TransferError::Format(format!(
                "chunk identifier has unexpected length {}: {s}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TransferError::Format(format!(
                "chunk identifier is not hex: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Algorithm implied by the id length.
    pub fn algorithm(&self) -> DigestAlgorithm {
        // Length is checked on construction.
        DigestAlgorithm::from_hex_len(self.0.len()).unwrap_or_default()
    }

    /// Name of the chunk artifact (`<hex>.zip`).
    pub fn artifact_name(&self) -> String {
        chunkferry_protocol::constants::chunk_artifact_name(&self.0)
    }

    /// Returns `true` if `digest` is this id, ignoring hex case.
    pub(crate) fn matches_hex(&self, digest: &str) -> bool {
        self.0.eq_ignore_ascii_case(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChunkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_input() {
        assert_eq!(
            DigestAlgorithm::Md5.digest_hex(b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn sha256_of_abc() {
        assert_eq!(
            DigestAlgorithm::Sha256.digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn identical_bytes_share_an_id() {
        let a = ChunkId::of(DigestAlgorithm::Md5, &[b'A'; 50]);
        let b = ChunkId::of(DigestAlgorithm::Md5, &[b'A'; 50]);
        let c = ChunkId::of(DigestAlgorithm::Md5, &[b'A'; 20]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn parse_keeps_recorded_case() {
        let id = ChunkId::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(id.as_str(), "D41D8CD98F00B204E9800998ECF8427E");
        assert_eq!(id.artifact_name(), "D41D8CD98F00B204E9800998ECF8427E.zip");
        assert_eq!(id.algorithm(), DigestAlgorithm::Md5);
    }

    #[test]
    fn parse_rejects_blank_and_malformed() {
        assert!(ChunkId::parse("").is_err());
        assert!(ChunkId::parse("abc").is_err());
        assert!(ChunkId::parse(&"z".repeat(32)).is_err());
        assert!(ChunkId::parse("../../../../etc/passwd/aaaaaaaaaa").is_err());
    }

    #[test]
    fn algorithm_follows_length() {
        let id = ChunkId::of(DigestAlgorithm::Sha256, b"x");
        assert_eq!(id.algorithm(), DigestAlgorithm::Sha256);
        assert_eq!(id.as_str().len(), 64);
    }

    #[test]
    fn matches_hex_ignores_case_only() {
        let id = ChunkId::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert!(id.matches_hex(&DigestAlgorithm::Md5.digest_hex(b"")));
        assert!(!id.matches_hex(&DigestAlgorithm::Md5.digest_hex(b"x")));
    }

    #[test]
    fn artifact_name_uses_zip_extension() {
        let id = ChunkId::of(DigestAlgorithm::Md5, b"");
        assert_eq!(id.artifact_name(), "d41d8cd98f00b204e9800998ecf8427e.zip");
    }

    #[test]
    fn incremental_hasher_matches_one_shot() {
        for alg in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            let mut h = alg.hasher();
            h.update(b"hello ");
            h.update(b"world");
            assert_eq!(h.finalize_hex(), alg.digest_hex(b"hello world"));
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&DigestAlgorithm::Sha256).unwrap();
        assert_eq!(json, r#""sha256""#);
        let alg: DigestAlgorithm = serde_json::from_str(r#""md5""#).unwrap();
        assert_eq!(alg, DigestAlgorithm::Md5);
    }
}
