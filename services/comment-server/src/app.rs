use std::path::Path;

use axum::{Router, routing::get};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::comments::{get_comment, insert_comment, list_comments},
    state::AppState,
};

/// JSON API under `/api/comments`; every other path is served from `static_dir`.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api/comments", get(list_comments).post(insert_comment))
        .route("/api/comments/{id}", get(get_comment))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
