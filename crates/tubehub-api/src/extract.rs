//! Extractors whose rejections render as the error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use tubehub_types::envelope::ApiResponse;

use crate::error::{ApiError, ApiResult};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Success envelope with its status code applied to the response.
pub struct Envelope<T>(pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.0.status_code)
            .unwrap_or(axum::http::StatusCode::OK);
        (status, axum::Json(self.0)).into_response()
    }
}

pub fn ok<T>(message: &str, data: T) -> Envelope<T> {
    Envelope(ApiResponse::ok(message, data))
}

pub fn created<T>(message: &str, data: T) -> Envelope<T> {
    Envelope(ApiResponse::created(message, data))
}

/// `value` trimmed, or a validation error naming `field` when blank.
pub fn required<'a>(field: &str, value: &'a str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(field, "is required"));
    }
    Ok(value)
}

/// Like `required`, for fields a patch may leave out.
pub fn optional<'a>(field: &str, value: Option<&'a str>) -> ApiResult<Option<&'a str>> {
    value.map(|v| required(field, v)).transpose()
}
