use axum::{Extension, extract::State, response::IntoResponse};
use tracing::info;

use tubehub_types::api::{UpdateAccountRequest, UpdateImageRequest};
use tubehub_types::models::{Actor, EntityKind};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, ok, optional};
use crate::state::{AppState, with_db};

pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let user = with_db(&state, move |db| db.get_user_by_id(actor.id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::User))?;
    Ok(ok("current user fetched", user.profile()))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let full_name = optional("full_name", req.full_name.as_deref())?.map(str::to_owned);
    let email = optional("email", req.email.as_deref())?.map(str::to_owned);
    if full_name.is_none() && email.is_none() {
        return Err(ApiError::validation("full_name", "nothing to update"));
    }
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::validation("email", "is not an email address"));
    }

    let user = with_db(&state, move |db| {
        db.update_account(actor.id, full_name.as_deref(), email.as_deref())
    })
    .await?;
    Ok(ok("account details updated", user.profile()))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<UpdateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let path = state.staging.resolve("file", &req.file)?;
    let stored = state.media.upload(&path).await?;

    let user = with_db(&state, move |db| db.set_avatar_url(actor.id, &stored.url)).await?;
    info!("User {} changed avatar", actor.username);
    Ok(ok("avatar updated", user.profile()))
}

pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<UpdateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let path = state.staging.resolve("file", &req.file)?;
    let stored = state.media.upload(&path).await?;

    let user = with_db(&state, move |db| db.set_cover_image_url(actor.id, &stored.url)).await?;
    Ok(ok("cover image updated", user.profile()))
}

/// Public channel page: counts plus whether the caller is subscribed.
pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::validation("username", "is required"));
    }

    let profile = with_db(&state, move |db| db.channel_profile(&username, actor.id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::User))?;
    Ok(ok("channel fetched", profile))
}

pub async fn watch_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let history = with_db(&state, move |db| db.watch_history(actor.id, page)).await?;
    Ok(ok("watch history fetched", history))
}
