//! Write authorization.
//!
//! Reads are never authenticated. Writes (POST and DELETE) are open unless a
//! token hash is configured, in which case the request must carry
//! `Authorization: Bearer <token>` whose SHA-256 matches.

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use blockd_core::config::AuthConfig;
use sha2::{Digest, Sha256};

/// Who may write.
#[derive(Clone, Debug)]
pub enum AuthPolicy {
    /// Every write is allowed.
    Open,
    /// Writes need a bearer token with this lowercase hex SHA-256.
    TokenHash(String),
}

impl AuthPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        match &config.token_hash {
            Some(hash) => Self::TokenHash(hash.to_ascii_lowercase()),
            None => Self::Open,
        }
    }

    /// Check a write request, returning `Forbidden` when it is not allowed.
    pub fn authorize(&self, headers: &HeaderMap) -> ApiResult<()> {
        let Self::TokenHash(expected) = self else {
            return Ok(());
        };
        match extract_bearer_token(headers) {
            Some(token) if hash_token(token) == *expected => Ok(()),
            Some(_) => {
                tracing::debug!("Rejected write with unknown token");
                Err(ApiError::Forbidden)
            }
            None => {
                tracing::debug!("Rejected write without bearer token");
                Err(ApiError::Forbidden)
            }
        }
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Lowercase hex SHA-256 of a token.
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
