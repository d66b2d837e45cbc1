//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors returned by API handlers, rendered as `{"detail": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::NotFound(msg) | Self::BadRequest(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!("{}: {}", self.status(), self.detail());
        let body = serde_json::json!({ "detail": self.detail() });
        (self.status(), Json(body)).into_response()
    }
}
