use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;

use tubehub_types::models::{Actor, EntityKind};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiQuery, ok};
use crate::state::{AppState, with_db};

/// Totals for the caller's own channel.
pub async fn channel_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let stats = with_db(&state, move |db| db.channel_stats(actor.id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::User))?;
    Ok(ok("channel stats fetched", stats))
}

/// Every video of the caller's channel, unpublished ones included.
pub async fn channel_videos(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let videos = with_db(&state, move |db| db.channel_videos(actor.id, page)).await?;
    Ok(ok("channel videos fetched", videos))
}

pub async fn healthcheck() -> impl IntoResponse {
    ok("ok", json!({ "status": "ok" }))
}
