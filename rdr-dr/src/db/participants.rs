//! Participant and organization lookups

use rdr_common::db::models::Participant;
use rdr_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Fetch a participant by id
pub async fn get_participant(
    conn: &mut SqliteConnection,
    participant_id: i64,
) -> Result<Option<Participant>> {
    let row = sqlx::query(
        "SELECT participant_id, organization_external_id FROM participants WHERE participant_id = ?",
    )
    .bind(participant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| Participant {
        participant_id: row.get("participant_id"),
        organization_external_id: row.get("organization_external_id"),
    }))
}

/// Check whether an organization external id is registered
pub async fn organization_exists(pool: &SqlitePool, external_id: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM organizations WHERE external_id = ?")
            .bind(external_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Register an organization (insert or replace)
pub async fn upsert_organization(
    pool: &SqlitePool,
    external_id: &str,
    display_name: &str,
) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO organizations (external_id, display_name) VALUES (?, ?)")
        .bind(external_id)
        .bind(display_name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Register a participant, paired to an organization or unpaired (None)
pub async fn upsert_participant(
    pool: &SqlitePool,
    participant_id: i64,
    organization_external_id: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participants (participant_id, organization_external_id)
        VALUES (?, ?)
        ON CONFLICT(participant_id) DO UPDATE SET
            organization_external_id = excluded.organization_external_id
        "#,
    )
    .bind(participant_id)
    .bind(organization_external_id)
    .execute(pool)
    .await?;
    Ok(())
}
