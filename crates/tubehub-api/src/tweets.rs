use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use tubehub_types::api::ContentRequest;
use tubehub_types::models::{Actor, EntityKind, Tweet};
use tubehub_types::page::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, created, ok, required};
use crate::state::{AppState, with_db};

pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required("content", &req.content)?.to_string();
    let tweet = with_db(&state, move |db| db.create_tweet(actor.id, &content)).await?;
    Ok(created("tweet created", Tweet::from(tweet)))
}

/// A user's tweets, newest first, with the caller's like state.
pub async fn user_tweets(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let tweets = with_db(&state, move |db| {
        if !db.user_exists(user_id)? {
            return Ok(None);
        }
        db.user_tweets(user_id, actor.id, page).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::User))?;

    Ok(ok("tweets fetched", tweets))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(tweet_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = required("content", &req.content)?.to_string();
    let tweet = with_db(&state, move |db| db.update_tweet(tweet_id, &content, actor.id)).await?;
    Ok(ok("tweet updated", Tweet::from(tweet)))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(tweet_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    with_db(&state, move |db| db.delete_tweet(tweet_id, actor.id)).await?;
    Ok(ok("tweet deleted", json!({})))
}
