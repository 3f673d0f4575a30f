//! Newline-delimited manifest codec.
//!
//! ```text
//! <original-file-name>
//! <hex-digest-of-chunk-1>
//! <hex-digest-of-chunk-2>
//! ...
//! ```
//!
//! Record order is the only source of reassembly order: ids carry no
//! position, and one id may appear several times when a file repeats a
//! chunk-sized run of bytes.

use std::io::{self, BufRead, Write};

use crate::TransferError;

/// Ordered chunk list of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Original file name (header record).
    pub file_name: String,
    /// Chunk ids in concatenation order, exactly as recorded.
    ///
    /// Kept as raw strings: a blank line decodes to an empty id and is
    /// rejected only when the assembler resolves it.
    pub chunks: Vec<String>,
}

impl Manifest {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            chunks: Vec::new(),
        }
    }

    /// Appends a chunk id.
    pub fn push(&mut self, id: impl Into<String>) {
        self.chunks.push(id.into());
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Writes the manifest to `w`.
    pub fn write_to<W: Write>(&self, w: W) -> Result<(), TransferError> {
        let mut writer = ManifestWriter::new(w, &self.file_name)?;
        for id in &self.chunks {
            writer.append(id)?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Encodes the manifest as text.
    pub fn encode(&self) -> Result<String, TransferError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| TransferError::Format(e.to_string()))
    }

    /// Decodes a manifest from a line-oriented stream.
    ///
    /// Fails with [`TransferError::Format`] if the stream is empty, the
    /// header is blank, or the text is not UTF-8.
    pub fn decode<R: BufRead>(r: R) -> Result<Self, TransferError> {
        let mut lines = r.lines();

        let file_name = match lines.next() {
            Some(line) => line.map_err(decode_error)?,
            None => return Err(TransferError::Format("empty manifest".into())),
        };
        if file_name.is_empty() {
            return Err(TransferError::Format("manifest has a blank file name".into()));
        }

        let chunks = lines
            .collect::<io::Result<Vec<_>>>()
            .map_err(decode_error)?;

        Ok(Self { file_name, chunks })
    }

    /// Decodes a manifest from text.
    pub fn parse(text: &str) -> Result<Self, TransferError> {
        Self::decode(text.as_bytes())
    }
}

fn decode_error(e: io::Error) -> TransferError {
    if e.kind() == io::ErrorKind::InvalidData {
        TransferError::Format(format!("manifest is not valid UTF-8: {e}"))
    } else {
        TransferError::Io(e)
    }
}

/// Rejects values that would break the one-record-per-line layout.
fn check_record(value: &str, what: &str) -> Result<(), TransferError> {
    if value.contains(['\n', '\r']) {
        return Err(TransferError::Format(format!(
            "{what} contains a line break: {value:?}"
        )));
    }
    Ok(())
}

/// Writes a manifest incrementally: header first, then one id per chunk.
pub struct ManifestWriter<W: Write> {
    inner: W,
    chunks: usize,
}

impl<W: Write> ManifestWriter<W> {
    /// Writes the header record.
    pub fn new(mut inner: W, file_name: &str) -> Result<Self, TransferError> {
        check_record(file_name, "file name")?;
        if file_name.is_empty() {
            return Err(TransferError::Format("file name is empty".into()));
        }
        writeln!(inner, "{file_name}")?;
        Ok(Self { inner, chunks: 0 })
    }

    /// Appends one chunk id record.
    pub fn append(&mut self, id: &str) -> Result<(), TransferError> {
        check_record(id, "chunk id")?;
        writeln!(self.inner, "{id}")?;
        self.chunks += 1;
        Ok(())
    }

    /// Number of chunk records written so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, TransferError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_header_then_ids() {
        let mut m = Manifest::new("movie.mkv");
        m.push("aa");
        m.push("bb");
        m.push("aa");
        assert_eq!(m.encode().unwrap(), "movie.mkv\naa\nbb\naa\n");
    }

    #[test]
    fn encode_without_chunks_is_header_only() {
        assert_eq!(Manifest::new("empty.bin").encode().unwrap(), "empty.bin\n");
    }

    #[test]
    fn decode_keeps_order_and_duplicates() {
        let m = Manifest::parse("name\nh1\nh1\nh3\n").unwrap();
        assert_eq!(m.file_name, "name");
        assert_eq!(m.chunks, vec!["h1", "h1", "h3"]);
    }

    #[test]
    fn decode_header_only() {
        let m = Manifest::parse("empty.bin\n").unwrap();
        assert_eq!(m.file_name, "empty.bin");
        assert!(m.is_empty());
    }

    #[test]
    fn decode_last_line_without_newline() {
        let m = Manifest::parse("name\nh1\nh2").unwrap();
        assert_eq!(m.chunks, vec!["h1", "h2"]);
    }

    #[test]
    fn decode_crlf_line_endings() {
        let m = Manifest::parse("name\r\nh1\r\nh2\r\n").unwrap();
        assert_eq!(m.file_name, "name");
        assert_eq!(m.chunks, vec!["h1", "h2"]);
    }

    #[test]
    fn decode_blank_line_is_an_empty_id() {
        let m = Manifest::parse("name\nh1\n\nh2\n").unwrap();
        assert_eq!(m.chunks, vec!["h1", "", "h2"]);
    }

    #[test]
    fn decode_empty_stream_fails() {
        assert!(matches!(
            Manifest::parse(""),
            Err(TransferError::Format(_))
        ));
    }

    #[test]
    fn decode_blank_header_fails() {
        assert!(matches!(
            Manifest::parse("\nh1\n"),
            Err(TransferError::Format(_))
        ));
    }

    #[test]
    fn decode_invalid_utf8_fails() {
        let bytes: &[u8] = b"name\n\xff\xfe\n";
        assert!(matches!(
            Manifest::decode(bytes),
            Err(TransferError::Format(_))
        ));
    }

    #[test]
    fn writer_rejects_line_breaks() {
        let err = ManifestWriter::new(Vec::new(), "evil\nname").err().unwrap();
        assert!(matches!(err, TransferError::Format(_)));

        let mut w = ManifestWriter::new(Vec::new(), "ok").unwrap();
        assert!(w.append("a\rb").is_err());
        assert_eq!(w.chunks(), 0);
    }

    #[test]
    fn writer_is_incremental() {
        let mut w = ManifestWriter::new(Vec::new(), "f").unwrap();
        w.append("x").unwrap();
        w.append("y").unwrap();
        assert_eq!(w.chunks(), 2);
        let out = w.finish().unwrap();
        assert_eq!(out, b"f\nx\ny\n");
    }

    #[test]
    fn decode_after_encode_preserves_structure() {
        let mut m = Manifest::new("archive.tar");
        for id in ["3", "1", "2", "1"] {
            m.push(id);
        }
        let back = Manifest::parse(&m.encode().unwrap()).unwrap();
        assert_eq!(back, m);
    }
}
