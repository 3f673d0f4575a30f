use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a relative file path does not escape its base directory.
///
/// Applied to uploaded file names and to the file name a remote manifest
/// declares, since both end up joined onto a local directory.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_upload_path(file_path: &str) -> Result<(), TransferError> {
    if file_path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let path = Path::new(file_path);

    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {file_path}"
        )));
    }

    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(TransferError::InvalidPath(format!(
                    "path prefix not allowed: {file_path}"
                )));
            }
            Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {file_path}"
                )));
            }
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
        }
    }

    if normal == 0 {
        return Err(TransferError::InvalidPath(format!(
            "path names no file: {file_path}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path() {
        assert!(validate_upload_path("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_upload_path("../../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_nested_parent_dir_traversal() {
        assert!(validate_upload_path("sub/../../../escape").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_upload_path("/tmp/malicious").is_err());
    }

    #[test]
    fn rejects_current_dir_only() {
        assert!(validate_upload_path(".").is_err());
        assert!(validate_upload_path("./").is_err());
    }

    #[test]
    fn accepts_simple_filename() {
        assert!(validate_upload_path("movie.mkv").is_ok());
    }

    #[test]
    fn accepts_subdirectory_path() {
        assert!(validate_upload_path("sub/dir/file.txt").is_ok());
    }

    #[test]
    fn accepts_dotfile() {
        assert!(validate_upload_path(".bashrc").is_ok());
    }

    #[test]
    fn rejects_single_parent_dir() {
        assert!(validate_upload_path("..").is_err());
    }
}
