//! Request fixtures.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use blockd_core::Digest;
use tower::ServiceExt;

/// `Digest` header value for `data`.
#[allow(dead_code)]
pub fn digest_of(data: &[u8]) -> String {
    Digest::compute(data).as_str().to_string()
}

/// Build a `POST /` request with the given headers and body.
#[allow(dead_code)]
pub fn post_block(
    content_length: Option<&str>,
    digest: Option<&str>,
    token: Option<&str>,
    body: &'static [u8],
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(length) = content_length {
        builder = builder.header("Content-Length", length);
    }
    if let Some(digest) = digest {
        builder = builder.header("Digest", digest);
    }
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Build a body-less request.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request through the router and collect status and body.
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}
