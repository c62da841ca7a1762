//! API error types.
//!
//! Every failure is answered with a plain-text body and a standard status
//! code; there is no structured error body.

use crate::ingest::IngestError;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use blockd_storage::StorageError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("bad digest")]
    BadDigest(#[source] blockd_core::Error),

    #[error("forbidden")]
    Forbidden,

    #[error("404 page not found")]
    NotFound,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Get the error code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) => "missing_header",
            Self::InvalidHeader(_) => "invalid_header",
            Self::BadDigest(_) => "bad_digest",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Ingest(e) => e.reason(),
            Self::Storage(_) => "storage_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidHeader(_) | Self::BadDigest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Ingest(e) => match e {
                IngestError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                IngestError::UnexpectedEof | IngestError::DigestMismatch { .. } => {
                    StatusCode::BAD_REQUEST
                }
                IngestError::Read(_) | IngestError::Sink(_) | IngestError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            // The block store contract reports every failure, including a
            // missing block, as a server error.
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body sent to the client.
    fn message(&self) -> String {
        match self {
            Self::Ingest(IngestError::Read(_) | IngestError::Sink(_) | IngestError::Storage(_)) => {
                "internal failure".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message(),
        )
            .into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SinkError;

    #[test]
    fn test_status_and_message() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ApiError::MissingHeader("Content-Length"),
                StatusCode::BAD_REQUEST,
                "missing header: Content-Length",
            ),
            (
                ApiError::InvalidHeader("Content-Length"),
                StatusCode::BAD_REQUEST,
                "invalid header: Content-Length",
            ),
            (
                ApiError::BadDigest(blockd_core::Error::BadDigestFormat("x".into())),
                StatusCode::BAD_REQUEST,
                "bad digest",
            ),
            (ApiError::Forbidden, StatusCode::FORBIDDEN, "forbidden"),
            (ApiError::NotFound, StatusCode::NOT_FOUND, "404 page not found"),
            (
                IngestError::TooLarge.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
                "post body too large",
            ),
            (
                IngestError::UnexpectedEof.into(),
                StatusCode::BAD_REQUEST,
                "unexpected end of block",
            ),
            (
                IngestError::Sink(SinkError::Io(std::io::Error::other("disk"))).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal failure",
            ),
            (
                StorageError::NotFound("abc".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "block not found: abc",
            ),
        ];

        for (error, status, message) in cases {
            assert_eq!(error.status_code(), status, "{error:?}");
            assert_eq!(error.message(), message);
        }
    }
}
