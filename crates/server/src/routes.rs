//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::post;
use tower_http::trace::TraceLayer;

/// Create the block router.
///
/// `POST /` creates; `GET` and `DELETE` on `/<id>` go through the fallback,
/// which answers 404 for any other method or path shape.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::create_block).fallback(handlers::not_found))
        .fallback(handlers::block_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
