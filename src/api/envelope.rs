use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    BadRequest,
    ValidationError,
    Unauthorized,
    Forbidden,
    Conflict,
    InternalError,
    ServerError,
}

impl ApiErrorCode {
    pub const ALL: [ApiErrorCode; 8] = [
        ApiErrorCode::NotFound,
        ApiErrorCode::BadRequest,
        ApiErrorCode::ValidationError,
        ApiErrorCode::Unauthorized,
        ApiErrorCode::Forbidden,
        ApiErrorCode::Conflict,
        ApiErrorCode::InternalError,
        ApiErrorCode::ServerError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::BadRequest => "BAD_REQUEST",
            ApiErrorCode::ValidationError => "VALIDATION_ERROR",
            ApiErrorCode::Unauthorized => "UNAUTHORIZED",
            ApiErrorCode::Forbidden => "FORBIDDEN",
            ApiErrorCode::Conflict => "CONFLICT",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
            ApiErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == raw)
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

/// `{success: true, data}` or `{success: false, error}`, with `data`
/// still untyped until a domain guard has accepted it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Success(Value),
    Failure(ApiError),
}
