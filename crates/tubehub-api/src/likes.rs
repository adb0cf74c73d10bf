use axum::{Extension, extract::State, response::IntoResponse};
use tracing::debug;
use uuid::Uuid;

use tubehub_db::relations::Relation;
use tubehub_types::api::{LikedSubjectsQuery, ToggleResponse};
use tubehub_types::models::Actor;
use tubehub_types::page::PageRequest;

use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, Envelope, ok};
use crate::state::{AppState, with_db};

pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    toggle_like(&state, &actor, Relation::like_video(video_id)).await
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    toggle_like(&state, &actor, Relation::like_comment(comment_id)).await
}

pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiPath(tweet_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    toggle_like(&state, &actor, Relation::like_tweet(tweet_id)).await
}

async fn toggle_like(
    state: &AppState,
    actor: &Actor,
    relation: Relation,
) -> ApiResult<Envelope<ToggleResponse>> {
    let actor_id = actor.id;
    let toggled = with_db(state, move |db| db.toggle(relation, actor_id)).await?;
    debug!("{} like {:?}: {:?}", actor.username, relation, toggled);
    Ok(ok("like toggled", ToggleResponse { state: toggled }))
}

/// Videos the caller likes, most recently liked first.
pub async fn liked_videos(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let videos = with_db(&state, move |db| db.liked_videos(actor.id, page)).await?;
    Ok(ok("liked videos fetched", videos))
}

/// Like rows of one kind held by the caller.
pub async fn liked_subjects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<LikedSubjectsQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    let kind = query.kind;
    let liked = with_db(&state, move |db| db.liked_subjects(actor.id, kind, page)).await?;
    Ok(ok("liked subjects fetched", liked))
}
