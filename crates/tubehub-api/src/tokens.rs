use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

use tubehub_types::api::TokenPair;
use tubehub_types::models::{Claims, RefreshClaims};

use crate::error::ApiError;

/// Signing material for access and refresh tokens. The two kinds use
/// separate secrets, so neither can stand in for the other.
pub struct TokenKeys {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// A freshly issued token pair plus the digest of its refresh token, which
/// is what gets stored.
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub refresh_digest: String,
}

impl TokenKeys {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<IssuedTokens, ApiError> {
        let access = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: expiry(self.access_ttl),
        };
        let refresh = RefreshClaims {
            sub: user_id,
            jti: hex::encode(rand::random::<[u8; 16]>()),
            exp: expiry(self.refresh_ttl),
        };

        let access_token = sign(&access, &self.access_secret)?;
        let refresh_token = sign(&refresh, &self.refresh_secret)?;
        Ok(IssuedTokens {
            refresh_digest: digest(&refresh_token),
            pair: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthenticated("invalid access token"))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthenticated("invalid refresh token"))
    }
}

/// SHA-256 hex digest of a refresh token, as stored on the user row.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn expiry(ttl: Duration) -> usize {
    (Utc::now() + ttl).timestamp() as usize
}

fn sign<T: serde::Serialize>(claims: &T, secret: &str) -> Result<String, ApiError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|e| {
        error!("Failed to sign token: {}", e);
        ApiError::Internal
    })
}
