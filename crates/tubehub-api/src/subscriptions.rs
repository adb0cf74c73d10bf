use axum::{Extension, extract::State, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use tubehub_db::relations::Relation;
use tubehub_types::api::ToggleResponse;
use tubehub_types::models::{Actor, EntityKind};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery, ok};
use crate::state::{AppState, with_db};

pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(channel_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let toggled = with_db(&state, move |db| {
        db.toggle(Relation::subscription(channel_id), actor.id)
    })
    .await?;
    info!("{} subscription to {}: {:?}", actor.username, channel_id, toggled);
    Ok(ok("subscription toggled", ToggleResponse { state: toggled }))
}

/// Users subscribed to a channel.
pub async fn channel_subscribers(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(channel_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let subscribers = with_db(&state, move |db| {
        if !db.user_exists(channel_id)? {
            return Ok(None);
        }
        db.channel_subscribers(channel_id, actor.id, page).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::User))?;

    Ok(ok("subscribers fetched", subscribers))
}

/// Channels a user is subscribed to.
pub async fn subscribed_channels(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(subscriber_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let channels = with_db(&state, move |db| {
        if !db.user_exists(subscriber_id)? {
            return Ok(None);
        }
        db.subscribed_channels(subscriber_id, actor.id, page).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::User))?;

    Ok(ok("subscribed channels fetched", channels))
}
