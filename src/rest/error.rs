use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Resource(err) => match err {
                ResourceError::InvalidReference(_) => StatusCode::BAD_REQUEST,
                ResourceError::NotFound { .. } | ResourceError::Parse { .. } => StatusCode::NOT_FOUND,
                ResourceError::Fetch { .. } => StatusCode::BAD_GATEWAY,
                ResourceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid_arguments",
            ApiError::Resource(err) => err.code(),
        }
    }
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
