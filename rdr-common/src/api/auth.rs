//! Shared-secret authentication for operations endpoints
//!
//! Operations-role endpoints (report listing, import trigger) require the
//! caller to present the shared secret in the `X-Api-Secret` header. The
//! secret is stored in the settings table as an i64; the special value 0
//! disables auth checking entirely (useful for local development and tests).
//!
//! This module contains only pure functions and database operations. HTTP
//! framework wiring lives in the service crates.

use sqlx::SqlitePool;

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Secret header missing from request
    MissingSecret,

    /// Secret header present but not a valid i64
    MalformedSecret(String),

    /// Secret does not match the stored value
    InvalidSecret,

    /// Database error loading shared secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingSecret => write!(f, "Missing X-Api-Secret header"),
            ApiAuthError::MalformedSecret(value) => write!(f, "Malformed secret: {}", value),
            ApiAuthError::InvalidSecret => write!(f, "Invalid secret"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// Load shared secret from database settings
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: disables auth checking
///
/// Generates and stores a new secret if none exists.
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Initialize shared secret if not present
///
/// Generates a cryptographically random non-zero i64 and stores it.
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

/// Validate a presented secret header value against the stored secret
///
/// A stored secret of 0 accepts everything (auth disabled).
pub fn validate_secret(provided: Option<&str>, shared_secret: i64) -> Result<(), ApiAuthError> {
    if shared_secret == 0 {
        return Ok(());
    }

    let value = provided.ok_or(ApiAuthError::MissingSecret)?;
    let parsed: i64 = value
        .parse()
        .map_err(|_| ApiAuthError::MalformedSecret(value.to_string()))?;

    if parsed != shared_secret {
        return Err(ApiAuthError::InvalidSecret);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_secret_disables_auth() {
        assert!(validate_secret(None, 0).is_ok());
        assert!(validate_secret(Some("anything"), 0).is_ok());
    }

    #[test]
    fn test_matching_secret_accepted() {
        assert!(validate_secret(Some("123456789"), 123456789).is_ok());
    }

    #[test]
    fn test_missing_secret_rejected() {
        assert!(matches!(
            validate_secret(None, 42),
            Err(ApiAuthError::MissingSecret)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        assert!(matches!(
            validate_secret(Some("41"), 42),
            Err(ApiAuthError::InvalidSecret)
        ));
    }

    #[test]
    fn test_malformed_secret_rejected() {
        assert!(matches!(
            validate_secret(Some("not-a-number"), 42),
            Err(ApiAuthError::MalformedSecret(_))
        ));
    }
}
