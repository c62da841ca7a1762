//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_LENGTH;
use blockd_core::Digest;

/// Header carrying the expected block digest.
pub const DIGEST_HEADER: &str = "digest";

/// Declared body length from `Content-Length`.
pub fn declared_length(headers: &HeaderMap) -> ApiResult<u64> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or(ApiError::MissingHeader("Content-Length"))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidHeader("Content-Length"))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::MissingHeader("Content-Length"));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::InvalidHeader("Content-Length"));
    }
    value
        .parse()
        .map_err(|_| ApiError::InvalidHeader("Content-Length"))
}

/// Expected digest from the `Digest` header.
pub fn expected_digest(headers: &HeaderMap) -> ApiResult<Digest> {
    let value = headers
        .get(DIGEST_HEADER)
        .map(|v| v.to_str().map_err(|_| ApiError::InvalidHeader("Digest")))
        .transpose()?
        .unwrap_or_default();
    if value.trim().is_empty() {
        return Err(ApiError::MissingHeader("Digest"));
    }
    Digest::parse_header(value).map_err(ApiError::BadDigest)
}
