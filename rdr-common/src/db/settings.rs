//! Settings table access
//!
//! Runtime tunables (redaction grace window, survey API endpoint and token,
//! support-desk identity, shared secret) live in a key/value settings table
//! so they can be changed without redeploying.

use sqlx::SqlitePool;

use crate::Result;

/// Redaction grace window, in days, after an approved deceased report
pub const KEY_GRACE_PERIOD_DAYS: &str = "deceased_grace_period_days";
/// External survey system (REDCap) API endpoint
pub const KEY_REDCAP_API_URL: &str = "redcap_api_url";
/// External survey system API token
pub const KEY_REDCAP_API_TOKEN: &str = "redcap_api_token";
/// Fallback author identity for imported reports with no reporter email
pub const KEY_SUPPORT_DESK_EMAIL: &str = "support_desk_email";

/// Get a setting value, if present
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value)
}

/// Get an integer setting value, falling back to a default
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<i64> =
        sqlx::query_scalar("SELECT CAST(value AS INTEGER) FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.unwrap_or(default))
}

/// Set a setting value (insert or replace)
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
