use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, response::IntoResponse};
use serde_json::json;
use tracing::{error, info, warn};

use tubehub_db::models::NewUser;
use tubehub_types::api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest,
};
use tubehub_types::models::{Actor, EntityKind};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, created, ok, required};
use crate::state::{AppState, with_db};
use crate::tokens::digest;

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = required("username", &req.username)?.to_lowercase();
    let email = required("email", &req.email)?.to_lowercase();
    let full_name = required("full_name", &req.full_name)?.to_string();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::validation("username", "must be 3 to 32 characters"));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("email", "is not an email address"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("password", "must be at least 8 characters"));
    }
    let avatar_path = state.staging.resolve("avatar_file", &req.avatar_file)?;
    let cover_path = req
        .cover_image_file
        .as_deref()
        .map(|name| state.staging.resolve("cover_image_file", name))
        .transpose()?;

    // Checked up front so a taken name does not cost an upload; the UNIQUE
    // constraints still decide races.
    let (u, e) = (username.clone(), email.clone());
    if with_db(&state, move |db| db.find_user_for_login(Some(u.as_str()), Some(e.as_str())))
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateKey("user with this username or email".into()));
    }

    let avatar = state.media.upload(&avatar_path).await?;
    let cover_url = match cover_path {
        Some(path) => state.media.upload(&path).await?.url,
        None => String::new(),
    };

    let password_hash = hash_password(&req.password)?;
    let user = with_db(&state, move |db| {
        db.create_user(NewUser {
            username: &username,
            email: &email,
            full_name: &full_name,
            password_hash: &password_hash,
            avatar_url: &avatar.url,
            cover_image_url: &cover_url,
        })
    })
    .await?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok(created("user registered successfully", user.profile()))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let email = req.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("username", "username or email is required"));
    }

    let (username, email) = (username.map(str::to_owned), email.map(str::to_owned));
    let user = with_db(&state, move |db| {
        db.find_user_for_login(username.as_deref(), email.as_deref())
    })
    .await?
    .ok_or(ApiError::NotFound(EntityKind::User))?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!("Failed login for {}", user.username);
        return Err(ApiError::Unauthenticated("invalid user credentials"));
    }

    let issued = state.tokens.issue(user.id, &user.username)?;
    let user_id = user.id;
    let stored = issued.refresh_digest.clone();
    with_db(&state, move |db| db.set_refresh_token_hash(user_id, Some(&stored))).await?;

    info!("User {} logged in", user.username);
    Ok(ok(
        "user logged in successfully",
        LoginResponse {
            user: user.profile(),
            access_token: issued.pair.access_token,
            refresh_token: issued.pair.refresh_token,
        },
    ))
}

/// Rotates the token pair. The presented refresh token must be the one most
/// recently issued; after rotation it no longer works.
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let claims = state.tokens.verify_refresh(req.refresh_token.trim())?;

    let user_id = claims.sub;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::Unauthenticated("invalid refresh token"))?;

    let issued = state.tokens.issue(user.id, &user.username)?;
    let presented = digest(req.refresh_token.trim());
    let next = issued.refresh_digest.clone();
    let rotated = with_db(&state, move |db| {
        db.rotate_refresh_token_hash(user_id, &presented, &next)
    })
    .await?;
    if !rotated {
        warn!("Stale refresh token presented for {}", user.username);
        return Err(ApiError::Unauthenticated("refresh token is expired or used"));
    }

    Ok(ok("access token refreshed", issued.pair))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let user_id = actor.id;
    with_db(&state, move |db| db.set_refresh_token_hash(user_id, None)).await?;
    info!("User {} logged out", actor.username);
    Ok(ok("user logged out", json!({})))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("new_password", "must be at least 8 characters"));
    }

    let user_id = actor.id;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound(EntityKind::User))?;

    if !verify_password(&req.old_password, &user.password_hash)? {
        return Err(ApiError::validation("old_password", "is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    with_db(&state, move |db| db.set_password_hash(user_id, &hash)).await?;

    Ok(ok("password changed successfully", json!({})))
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::Internal
        })
}

fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!("Stored password hash is unreadable: {}", e);
        ApiError::Internal
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }
}
