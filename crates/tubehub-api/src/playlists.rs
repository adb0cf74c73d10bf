use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use tubehub_db::models::PlaylistPatch;
use tubehub_types::api::{CreatePlaylistRequest, UpdatePlaylistRequest};
use tubehub_types::models::{Actor, EntityKind, Playlist};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, created, ok, optional, required};
use crate::state::{AppState, with_db};

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<CreatePlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required("name", &req.name)?.to_string();
    let description = required("description", &req.description)?.to_string();

    let playlist =
        with_db(&state, move |db| db.create_playlist(actor.id, &name, &description)).await?;
    info!("{} created playlist {}", actor.username, playlist.id);
    Ok(created("playlist created", Playlist::from(playlist)))
}

pub async fn user_playlists(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let playlists = with_db(&state, move |db| {
        if !db.user_exists(user_id)? {
            return Ok(None);
        }
        db.user_playlists(user_id, page).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::User))?;

    Ok(ok("playlists fetched", playlists))
}

/// The playlist with its videos in position order.
pub async fn get_playlist(
    State(state): State<AppState>,
    ApiPath(playlist_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = with_db(&state, move |db| db.playlist_detail(playlist_id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::Playlist))?;
    Ok(ok("playlist fetched", detail))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(playlist_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    let patch = PlaylistPatch {
        name: optional("name", req.name.as_deref())?.map(str::to_owned),
        description: optional("description", req.description.as_deref())?.map(str::to_owned),
    };
    if patch.name.is_none() && patch.description.is_none() {
        return Err(ApiError::validation("name", "nothing to update"));
    }

    let playlist =
        with_db(&state, move |db| db.update_playlist(playlist_id, &patch, actor.id)).await?;
    Ok(ok("playlist updated", Playlist::from(playlist)))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(playlist_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    with_db(&state, move |db| db.delete_playlist(playlist_id, actor.id)).await?;
    Ok(ok("playlist deleted", json!({})))
}

pub async fn add_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath((video_id, playlist_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let playlist = with_db(&state, move |db| {
        db.add_playlist_video(playlist_id, video_id, actor.id)
    })
    .await?;
    Ok(ok("video added to playlist", Playlist::from(playlist)))
}

/// Removes every occurrence of the video from the playlist.
pub async fn remove_video(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath((video_id, playlist_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let playlist = with_db(&state, move |db| {
        db.remove_playlist_video(playlist_id, video_id, actor.id)
    })
    .await?;
    Ok(ok("video removed from playlist", Playlist::from(playlist)))
}
