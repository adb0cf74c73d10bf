use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::warn;

use tubehub_types::models::Actor;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// Validates the bearer access token, confirms the user still exists and
/// attaches an `Actor` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthenticated("missing bearer token"))?;

    let claims = state.tokens.verify_access(bearer.token())?;

    let user_id = claims.sub;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id)).await?;
    let Some(user) = user else {
        warn!("Access token for deleted user {}", user_id);
        return Err(ApiError::Unauthenticated("invalid access token"));
    };

    req.extensions_mut().insert(Actor {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(req).await)
}
