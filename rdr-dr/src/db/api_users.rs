//! ApiUser registry
//!
//! Resolves (system, username) pairs to identity rows used for report
//! authorship and review attribution. Load-or-create: the same pair always
//! resolves to the same row. Creation happens inside the caller's
//! transaction so an aborted report submission leaves no orphan identity.

use rdr_common::Result;
use sqlx::{Row, SqliteConnection};

/// Look up an identity row, creating it on miss. Returns the row id.
pub async fn load_or_init(
    conn: &mut SqliteConnection,
    system: &str,
    username: &str,
) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM api_users WHERE system = ? AND username = ?")
            .bind(system)
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO api_users (system, username) VALUES (?, ?)")
        .bind(system)
        .bind(username)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Fetch an identity row by id
pub async fn get_api_user(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<rdr_common::db::models::ApiUser>> {
    let row = sqlx::query("SELECT id, system, username FROM api_users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| rdr_common::db::models::ApiUser {
        id: row.get("id"),
        system: row.get("system"),
        username: row.get("username"),
    }))
}
