use serde::{Deserialize, Serialize};

/// Query string of `GET /download`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadQuery {
    /// Base location holding `links.txt` and the chunk artifacts.
    #[serde(default)]
    pub url: Option<String>,
}

/// Coarse success body (`{"status":true}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: bool,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: true }
    }
}

/// Body returned after a file has been split and its manifest recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: bool,
    /// Session identifier of the chunk store that holds the file.
    pub id: String,
    pub file_name: String,
    pub chunks: usize,
    pub bytes: u64,
    /// Path, relative to the serving node, to pass as `url` to `/download`.
    pub base: String,
}

/// Failure body. The message is diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ok_serializes_like_the_legacy_body() {
        let json = serde_json::to_string(&StatusResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":true}"#);
    }

    #[test]
    fn upload_response_uses_camel_case() {
        let resp = UploadResponse {
            status: true,
            id: "abc".into(),
            file_name: "movie.mkv".into(),
            chunks: 3,
            bytes: 120,
            base: "/chunks/abc".into(),
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["fileName"], "movie.mkv");
        assert_eq!(value["chunks"], 3);
    }

    #[test]
    fn download_query_url_is_optional() {
        let q: DownloadQuery = serde_json::from_str("{}").unwrap();
        assert!(q.url.is_none());
    }

    #[test]
    fn error_response_is_not_ok() {
        let e = ErrorResponse::new("boom");
        assert!(!e.status);
        assert_eq!(e.error, "boom");
    }
}
