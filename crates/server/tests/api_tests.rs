//! Integration tests for the block HTTP API.

mod common;

use axum::http::StatusCode;
use blockd_core::config::AppConfig;
use common::{TEST_TOKEN, TestServer, digest_of, empty_request, post_block, send};

const HELLO_DIGEST: &str = "SHA=qvTGHdzF6KLavt4PO0gs2a6pQ00=";
const HELLO_ID: &str = "qvTGHdzF6KLavt4PO0gs2a6pQ00";

fn text(body: &[u8]) -> &str {
    std::str::from_utf8(body).unwrap()
}

#[tokio::test]
async fn test_create_block_returns_length() {
    let server = TestServer::new().await;

    let response = tower::ServiceExt::oneshot(
        server.router.clone(),
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hello"),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("location").unwrap(),
        &format!("/{HELLO_ID}")
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"5");

    assert!(server.storage.exists(HELLO_ID).await.unwrap());
}

#[tokio::test]
async fn test_create_short_body() {
    let server = TestServer::new().await;

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hell"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text(&body), "unexpected end of block");
    assert!(!server.storage.exists(HELLO_ID).await.unwrap());
}

#[tokio::test]
async fn test_create_long_body() {
    let server = TestServer::new().await;

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hello!"),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(text(&body), "post body too large");
    assert!(!server.storage.exists(HELLO_ID).await.unwrap());
}

#[tokio::test]
async fn test_create_digest_mismatch() {
    let server = TestServer::new().await;

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"jello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text(&body), "digest did not match content");
}

#[tokio::test]
async fn test_create_empty_block() {
    let server = TestServer::new().await;

    let (status, body) = send(
        &server.router,
        post_block(Some("0"), Some(&digest_of(b"")), None, b""),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&body), "0");
}

#[tokio::test]
async fn test_create_header_validation() {
    let server = TestServer::new().await;

    let cases = [
        (None, Some(HELLO_DIGEST), "missing header: Content-Length"),
        (Some("five"), Some(HELLO_DIGEST), "invalid header: Content-Length"),
        (Some("5"), None, "missing header: Digest"),
        (Some("5"), Some("SHA=qvTGHdzF"), "bad digest"),
        (Some("5"), Some("MD5=qvTGHdzF6KLavt4PO0gs2a6pQ00="), "bad digest"),
    ];

    for (length, digest, expected) in cases {
        let (status, body) = send(&server.router, post_block(length, digest, None, b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{expected}");
        assert_eq!(text(&body), expected);
    }
}

#[tokio::test]
async fn test_create_declared_length_over_limit() {
    let mut config = AppConfig::for_testing();
    config.server.max_block_size = 4;
    let server = TestServer::with_config(config).await;

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(text(&body), "post body too large");
}

#[tokio::test]
async fn test_get_unknown_block_is_server_error() {
    let server = TestServer::new().await;

    let (status, _) = send(&server.router, empty_request("GET", "/unknown-id", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_block_lifecycle() {
    let server = TestServer::new().await;

    let (status, _) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/{HELLO_ID}");
    let (status, body) = send(&server.router, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello");

    let (status, body) = send(&server.router, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, _) = send(&server.router, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&server.router, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_nested_block_ids_are_served() {
    let server = TestServer::new().await;

    let mut upload = server.storage.put_stream("a/b-c/d_e").await.unwrap();
    upload
        .write(bytes::Bytes::from_static(b"nested"))
        .await
        .unwrap();
    upload.finish().await.unwrap();

    let (status, body) = send(&server.router, empty_request("GET", "/a/b-c/d_e", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"nested");
}

#[tokio::test]
async fn test_writes_require_token_when_configured() {
    let server = TestServer::with_token().await;

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), None, b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(text(&body), "forbidden");

    let (status, _) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), Some("wrong"), b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &server.router,
        post_block(Some("5"), Some(HELLO_DIGEST), Some(TEST_TOKEN), b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&body), "5");

    // Reads stay open.
    let uri = format!("/{HELLO_ID}");
    let (status, _) = send(&server.router, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&server.router, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(text(&body), "forbidden");

    let (status, _) = send(&server.router, empty_request("DELETE", &uri, Some(TEST_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_authorization_checked_before_headers() {
    let server = TestServer::with_token().await;

    let (status, _) = send(&server.router, post_block(None, None, None, b"hello")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_other_requests_are_not_found() {
    let server = TestServer::new().await;

    let cases = [
        ("GET", "/"),
        ("PUT", "/"),
        ("DELETE", "/"),
        ("PUT", "/abc"),
        ("PATCH", "/abc"),
        ("POST", "/abc"),
        ("GET", "/a//b"),
        ("GET", "/a/"),
        ("GET", "/a.b"),
        ("GET", "/a/../b"),
    ];

    for (method, uri) in cases {
        let (status, body) = send(&server.router, empty_request(method, uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(text(&body), "404 page not found");
    }
}
