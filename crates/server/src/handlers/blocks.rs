//! Block handlers: `POST /`, `GET /<id>`, `DELETE /<id>`.

use super::common::{declared_length, expected_digest};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use blockd_core::BlockId;
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

/// Create a block from the request body.
///
/// Responds with the verified length as the body. The block id is its content
/// address and is returned in `Location`.
pub async fn create_block(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Response> {
    state.auth.authorize(&headers)?;
    let declared = declared_length(&headers)?;
    let expected = expected_digest(&headers)?;

    // A body that fails mid-stream ended before its declared length.
    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e));
    let mut reader = StreamReader::new(stream);

    let created = state.blocks.create(&mut reader, declared, &expected).await?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (LOCATION, format!("/{}", created.id)),
        ],
        created.length.to_string(),
    )
        .into_response())
}

/// Stream a block back.
pub async fn get_block(state: &AppState, id: &BlockId) -> ApiResult<Response> {
    let block = state.blocks.get(id).await?;
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, block.size.to_string()),
        ],
        Body::from_stream(block.stream),
    )
        .into_response())
}

/// Delete a block.
pub async fn delete_block(state: &AppState, headers: &HeaderMap, id: &BlockId) -> ApiResult<Response> {
    state.auth.authorize(headers)?;
    state.blocks.delete(id).await?;
    Ok(StatusCode::OK.into_response())
}

/// Dispatch `GET` and `DELETE` on block paths; everything else is 404.
///
/// Block ids span several path segments, so they are matched here rather
/// than by a route pattern.
pub async fn block_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let Ok(id) = BlockId::from_path(uri.path()) else {
        return Err(ApiError::NotFound);
    };
    match method {
        Method::GET => get_block(&state, &id).await,
        Method::DELETE => delete_block(&state, &headers, &id).await,
        _ => Err(ApiError::NotFound),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
