use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use tubehub_db::StoreError;
use tubehub_types::envelope::ApiErrorBody;
use tubehub_types::models::EntityKind;

use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("you do not own this {0}")]
    NotOwner(EntityKind),

    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("{0} already exists")]
    DuplicateKey(String),

    #[error("a channel cannot subscribe to itself")]
    SelfReference,

    #[error("media upload failed")]
    Upstream(String),

    #[error("internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::SelfReference => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotOwner(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateKey(_) => StatusCode::CONFLICT,
            Self::Upstream(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, .. } => Self::NotFound(kind),
            StoreError::NotOwner { kind, id, actor } => {
                warn!("{} rejected write to {} {}", actor, kind, id);
                Self::NotOwner(kind)
            }
            StoreError::DuplicateKey { field } => Self::DuplicateKey(field),
            StoreError::SelfReference => Self::SelfReference,
            other => {
                error!("Store error: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        warn!("Media store failure: {}", err);
        Self::Upstream(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation("path", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match &self {
            Self::Validation { field, message } => {
                ("invalid request".to_string(), vec![format!("{field}: {message}")])
            }
            Self::Upstream(detail) => (self.to_string(), vec![detail.clone()]),
            _ => (self.to_string(), Vec::new()),
        };

        let body = ApiErrorBody::new(status.as_u16(), message, errors);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::not_found(EntityKind::Video, "x"), StatusCode::NOT_FOUND),
            (
                StoreError::DuplicateKey {
                    field: "email".into(),
                },
                StatusCode::CONFLICT,
            ),
            (StoreError::SelfReference, StatusCode::BAD_REQUEST),
            (StoreError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (store, status) in cases {
            assert_eq!(ApiError::from(store).status(), status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(StoreError::InvalidView {
            view: "feed",
            reason: "users.password_hash is not a public column".into(),
        });
        assert_eq!(err.to_string(), "internal server error");
    }
}
