//! Participant summary projection
//!
//! Denormalized read-model updated by the lifecycle engine after every state
//! transition. `set_deceased_state` runs on the engine's transaction so the
//! report row and the summary cannot diverge after a commit. Contact PII
//! columns are left untouched by the projection; redaction happens at read
//! time in the API layer.

use chrono::{DateTime, NaiveDate, Utc};
use rdr_common::db::models::{DeceasedStatus, ParticipantSummary};
use rdr_common::{time, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Project a report state transition onto the summary row
pub async fn set_deceased_state(
    conn: &mut SqliteConnection,
    participant_id: i64,
    status: DeceasedStatus,
    authored: Option<DateTime<Utc>>,
    date_of_death: Option<NaiveDate>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participant_summary
            (participant_id, deceased_status, deceased_authored, date_of_death)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(participant_id) DO UPDATE SET
            deceased_status = excluded.deceased_status,
            deceased_authored = excluded.deceased_authored,
            date_of_death = excluded.date_of_death
        "#,
    )
    .bind(participant_id)
    .bind(status.as_str())
    .bind(authored.map(time::format_timestamp))
    .bind(date_of_death.map(|d| d.to_string()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Fetch the summary row for a participant, if one exists
pub async fn get_summary(
    pool: &SqlitePool,
    participant_id: i64,
) -> Result<Option<ParticipantSummary>> {
    let row = sqlx::query(
        r#"
        SELECT participant_id, deceased_status, deceased_authored, date_of_death,
               phone, email, address, recontact_method
        FROM participant_summary
        WHERE participant_id = ?
        "#,
    )
    .bind(participant_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let deceased_status: String = row.get("deceased_status");
            let deceased_authored: Option<String> = row.get("deceased_authored");
            let date_of_death: Option<String> = row.get("date_of_death");

            Ok(Some(ParticipantSummary {
                participant_id: row.get("participant_id"),
                deceased_status: DeceasedStatus::parse(&deceased_status)?,
                deceased_authored: deceased_authored
                    .map(|s| time::parse_stored_timestamp(&s))
                    .transpose()?,
                date_of_death: date_of_death
                    .map(|s| time::parse_client_date(&s))
                    .transpose()?,
                phone: row.get("phone"),
                email: row.get("email"),
                address: row.get("address"),
                recontact_method: row.get("recontact_method"),
            }))
        }
        None => Ok(None),
    }
}

/// Set contact PII on a summary row (registration-time data)
pub async fn upsert_contact_info(
    pool: &SqlitePool,
    participant_id: i64,
    phone: Option<&str>,
    email: Option<&str>,
    address: Option<&str>,
    recontact_method: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participant_summary
            (participant_id, deceased_status, phone, email, address, recontact_method)
        VALUES (?, 'UNSET', ?, ?, ?, ?)
        ON CONFLICT(participant_id) DO UPDATE SET
            phone = excluded.phone,
            email = excluded.email,
            address = excluded.address,
            recontact_method = excluded.recontact_method
        "#,
    )
    .bind(participant_id)
    .bind(phone)
    .bind(email)
    .bind(address)
    .bind(recontact_method)
    .execute(pool)
    .await?;

    Ok(())
}
