//! The uniform response envelopes every use-case returns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code,
            success: status_code < 400,
            message: message.into(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(200, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(201, message, data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
}

impl ApiErrorBody {
    pub fn new(status_code: u16, message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status_code,
            success: false,
            message: message.into(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_use_camel_case_keys() {
        let ok = serde_json::to_value(ApiResponse::ok("fine", 1)).unwrap();
        assert_eq!(ok["statusCode"], 200);
        assert_eq!(ok["success"], true);

        let err = serde_json::to_value(ApiErrorBody::new(404, "gone", vec![])).unwrap();
        assert_eq!(err["success"], false);
        assert!(err["errors"].as_array().unwrap().is_empty());
    }
}
