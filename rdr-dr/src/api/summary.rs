//! Participant summary read endpoint with deceased-PII redaction
//!
//! Redaction is policy enforced at the read boundary, not stored state: once
//! a deceased report is APPROVED and its authored timestamp is older than the
//! configured grace window, contact PII is withheld and the recontact method
//! is forced to a fixed "no contact" sentinel. Within the window the fields
//! remain visible.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Duration;
use rdr_common::db::models::{DeceasedStatus, ParticipantSummary};
use rdr_common::db::settings;
use rdr_common::{time, Error};
use serde::Serialize;

use crate::api::ApiError;
use crate::db::{participants, summary};
use crate::AppState;

/// Recontact method emitted for redacted deceased participants
const NO_CONTACT: &str = "NO_CONTACT";

/// Client view of a participant summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub participant_id: i64,
    pub deceased_status: String,
    pub deceased_authored: Option<String>,
    pub date_of_death: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub recontact_method: Option<String>,
}

/// GET /api/participant/:id/summary
pub async fn get_participant_summary(
    State(state): State<AppState>,
    Path(participant_id): Path<i64>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let mut conn = state.db.acquire().await.map_err(Error::Database)?;
    participants::get_participant(&mut conn, participant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Participant {}", participant_id)))?;
    drop(conn);

    // A participant with no summary row reads as an empty, non-deceased summary
    let row = summary::get_summary(&state.db, participant_id)
        .await?
        .unwrap_or(ParticipantSummary {
            participant_id,
            deceased_status: DeceasedStatus::Unset,
            deceased_authored: None,
            date_of_death: None,
            phone: None,
            email: None,
            address: None,
            recontact_method: None,
        });

    let grace_days =
        settings::get_setting_i64(&state.db, settings::KEY_GRACE_PERIOD_DAYS, 30).await?;
    let redact = is_redacted(&row, grace_days, time::now());

    let response = if redact {
        SummaryResponse {
            participant_id: row.participant_id,
            deceased_status: row.deceased_status.as_str().to_string(),
            deceased_authored: row.deceased_authored.map(time::format_timestamp),
            date_of_death: row.date_of_death.map(|d| d.to_string()),
            phone: None,
            email: None,
            address: None,
            recontact_method: Some(NO_CONTACT.to_string()),
        }
    } else {
        SummaryResponse {
            participant_id: row.participant_id,
            deceased_status: row.deceased_status.as_str().to_string(),
            deceased_authored: row.deceased_authored.map(time::format_timestamp),
            date_of_death: row.date_of_death.map(|d| d.to_string()),
            phone: row.phone,
            email: row.email,
            address: row.address,
            recontact_method: row.recontact_method,
        }
    };

    Ok(Json(response))
}

/// Whether contact PII must be withheld for this summary
fn is_redacted(
    row: &ParticipantSummary,
    grace_days: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    if row.deceased_status != DeceasedStatus::Approved {
        return false;
    }
    match row.deceased_authored {
        Some(authored) => now - authored > Duration::days(grace_days),
        None => false,
    }
}
