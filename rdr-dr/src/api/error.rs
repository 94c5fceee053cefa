//! HTTP translation of lifecycle engine errors
//!
//! Validation, not-found, and conflict errors raised by the engine are never
//! swallowed; they surface here as 400/404/409 with a descriptive message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rdr_common::Error;
use serde_json::json;

/// API error wrapper carrying the common error taxonomy
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
