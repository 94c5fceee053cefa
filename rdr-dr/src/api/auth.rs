//! Authentication middleware for operations endpoints
//!
//! Report listing and the import trigger are operations-role endpoints.
//! Callers present the shared secret in the `X-Api-Secret` header; the
//! stored value 0 disables auth checking (local development and tests).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rdr_common::api::auth::{validate_secret, ApiAuthError};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Authentication middleware
///
/// Returns 401 Unauthorized if validation fails. Applied to protected routes
/// only; the health endpoint does NOT use this middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let provided = request
        .headers()
        .get("x-api-secret")
        .and_then(|value| value.to_str().ok());

    validate_secret(provided, state.shared_secret).map_err(|e| {
        warn!("Operations auth failed: {}", e);
        AuthError(e)
    })?;

    Ok(next.run(request).await)
}

/// Authentication error for HTTP responses
#[derive(Debug)]
pub struct AuthError(ApiAuthError);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ApiAuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
