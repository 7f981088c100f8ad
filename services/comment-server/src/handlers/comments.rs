use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use comment_store::{Comment, CommentCreate};
use serde::Deserialize;
use tracing::info;

use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

/// How many comments the list endpoint returns.
pub const LIST_LIMIT: u64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl NewComment {
    /// An empty name counts as no name, so the placeholder is stored.
    pub fn into_builder(self) -> CommentCreate {
        CommentCreate::new()
            .set_nillable_name(self.name.filter(|name| !name.is_empty()))
            .set_nillable_text(self.text)
    }
}

pub async fn insert_comment(
    State(state): State<AppState>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request("Bind", rejection.body_text()))?;

    let comment = state
        .comments
        .create(request.into_builder())
        .await
        .map_err(|err| ApiError::from_storage("Save", err))?;

    info!(id = comment.id, "inserted comment");
    Ok(StatusCode::CREATED)
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Comment>> {
    let id = id
        .parse::<i64>()
        .map_err(|err| ApiError::bad_request("ParseInt", err))?;

    let comment = state
        .comments
        .get(id)
        .await
        .map_err(|err| ApiError::from_storage("Get", err))?;
    Ok(Json(comment))
}

pub async fn list_comments(State(state): State<AppState>) -> ApiResult<Json<Vec<Comment>>> {
    let comments = state
        .comments
        .list_recent(LIST_LIMIT)
        .await
        .map_err(|err| ApiError::from_storage("All", err))?;
    Ok(Json(comments))
}
