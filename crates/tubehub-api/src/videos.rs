use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use tubehub_db::StoreError;
use tubehub_db::guard::require_owner;
use tubehub_db::models::{NewVideo, VideoPatch};
use tubehub_db::views::VideoFeed;
use tubehub_types::api::{PublishVideoRequest, UpdateVideoRequest, VideoListQuery};
use tubehub_types::models::{Actor, EntityKind, Video};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, created, ok, optional, required};
use crate::state::{AppState, with_db};

/// Published videos, searchable by title and filterable by channel.
pub async fn list_videos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VideoListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    let feed = VideoFeed {
        query: query
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty()),
        owner: query.user_id,
        sort: query.sort_by.unwrap_or_default(),
        direction: query.sort_type.unwrap_or_default(),
    };

    let videos = with_db(&state, move |db| db.video_feed(&feed, page)).await?;
    Ok(ok("videos fetched", videos))
}

pub async fn publish_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<PublishVideoRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = required("title", &req.title)?.to_string();
    let description = required("description", &req.description)?.to_string();
    let video_path = state.staging.resolve("video_file", &req.video_file)?;
    let thumbnail_path = state.staging.resolve("thumbnail_file", &req.thumbnail_file)?;

    let media = state.media.upload(&video_path).await?;
    let thumbnail = state.media.upload(&thumbnail_path).await?;

    let video = with_db(&state, move |db| {
        db.create_video(NewVideo {
            owner_id: actor.id,
            title: &title,
            description: &description,
            media_url: &media.url,
            thumbnail_url: &thumbnail.url,
            duration_seconds: media.duration_seconds.unwrap_or(0.0),
        })
    })
    .await?;

    info!("{} published video {}", actor.username, video.id);
    Ok(created("video published", Video::from(video)))
}

/// Counts a view for the caller, then returns the detail including it.
pub async fn get_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = with_db(&state, move |db| db.view_video(video_id, actor.id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::Video))?;

    Ok(ok("video fetched", detail))
}

pub async fn update_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateVideoRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = optional("title", req.title.as_deref())?.map(str::to_owned);
    let description = optional("description", req.description.as_deref())?.map(str::to_owned);
    let thumbnail_path = req
        .thumbnail_file
        .as_deref()
        .map(|name| state.staging.resolve("thumbnail_file", name))
        .transpose()?;
    if title.is_none() && description.is_none() && thumbnail_path.is_none() {
        return Err(ApiError::validation("title", "nothing to update"));
    }

    // Ownership is settled before anything is uploaded.
    with_db(&state, move |db| {
        let video = db
            .get_video(video_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Video, video_id))?;
        require_owner(&video, actor.id)
    })
    .await?;

    let thumbnail_url = match thumbnail_path {
        Some(path) => Some(state.media.upload(&path).await?.url),
        None => None,
    };
    let patch = VideoPatch {
        title,
        description,
        thumbnail_url,
    };

    let video = with_db(&state, move |db| db.update_video(video_id, &patch, actor.id)).await?;
    Ok(ok("video updated", Video::from(video)))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    with_db(&state, move |db| db.delete_video(video_id, actor.id)).await?;
    info!("{} deleted video {}", actor.username, video_id);
    Ok(ok("video deleted", json!({})))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let video = with_db(&state, move |db| db.toggle_publish(video_id, actor.id)).await?;
    info!(
        "Video {} is now {}",
        video.id,
        if video.is_published { "published" } else { "unpublished" }
    );
    Ok(ok("publish status toggled", Video::from(video)))
}
