use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use tubehub_types::api::ContentRequest;
use tubehub_types::models::{Actor, Comment, EntityKind};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, created, ok, required};
use crate::state::{AppState, with_db};

/// Comments on a video the caller can see, newest first.
pub async fn video_comments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let comments = with_db(&state, move |db| {
        if db.video_detail(video_id, actor.id)?.is_none() {
            return Ok(None);
        }
        db.video_comments(video_id, actor.id, page).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::Video))?;

    Ok(ok("comments fetched", comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required("content", &req.content)?.to_string();
    let comment = with_db(&state, move |db| db.create_comment(video_id, actor.id, &content)).await?;
    Ok(created("comment added", Comment::from(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required("content", &req.content)?.to_string();
    let comment =
        with_db(&state, move |db| db.update_comment(comment_id, &content, actor.id)).await?;
    Ok(ok("comment updated", Comment::from(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    with_db(&state, move |db| db.delete_comment(comment_id, actor.id)).await?;
    Ok(ok("comment deleted", json!({})))
}
