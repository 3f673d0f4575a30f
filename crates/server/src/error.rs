use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use chunkferry_protocol::ErrorResponse;
use chunkferry_transfer::{SourceError, TransferError};

/// Errors produced by the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("chunk source error: {0}")]
    Source(#[from] SourceError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected: {self}");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let resp = ServerError::BadRequest("Missing required parameters".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transfer_failures_map_to_500() {
        let err = ServerError::from(TransferError::Format("empty manifest".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "manifest format error: empty manifest");

        let err = ServerError::from(SourceError::Status {
            status: 404,
            location: "http://peer/links.txt".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
