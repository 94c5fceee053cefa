//! Deceased report creation and review endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use rdr_common::db::models::{ApiUser, DeceasedReport};
use rdr_common::Error;
use sqlx::SqlitePool;

use crate::api::ApiError;
use crate::db::api_users;
use crate::{fhir, lifecycle, AppState};

/// POST /api/participant/:id/observation
///
/// Create a deceased report. 400 on validation failure, 404 for an unknown
/// participant, 409 if an active report already exists.
pub async fn create_observation(
    State(state): State<AppState>,
    Path(participant_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let submission = fhir::parse_submission(&body)?;
    let report = lifecycle::create_report(&state.db, participant_id, submission).await?;
    let json = serialize_report(&state.db, &report).await?;
    Ok(Json(json))
}

/// POST /api/participant/:id/observation/:report_id/review
///
/// Review a pending report: approve ("final") or deny ("cancelled").
/// 400 if the report is not currently PENDING, 404 for an unknown report.
pub async fn review_observation(
    State(state): State<AppState>,
    Path((participant_id, report_id)): Path<(i64, i64)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let decision = fhir::parse_review(&body)?;

    // The URL names the participant; reject a mismatched report id before
    // any state changes.
    let mut conn = state.db.acquire().await.map_err(Error::Database)?;
    let existing = crate::db::reports::get_report(&mut conn, report_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Deceased report {}", report_id)))?;
    if existing.participant_id != participant_id {
        return Err(Error::NotFound(format!(
            "Deceased report {} for participant {}",
            report_id, participant_id
        ))
        .into());
    }
    drop(conn);

    let report = lifecycle::review_report(&state.db, report_id, decision).await?;
    let json = serialize_report(&state.db, &report).await?;
    Ok(Json(json))
}

/// Resolve author and reviewer identities and emit the client wire format
pub async fn serialize_report(
    pool: &SqlitePool,
    report: &DeceasedReport,
) -> rdr_common::Result<serde_json::Value> {
    let mut conn = pool.acquire().await?;

    let author = api_users::get_api_user(&mut conn, report.author_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Missing author {}", report.author_id)))?;

    let reviewer: Option<ApiUser> = match report.reviewer_id {
        Some(id) => api_users::get_api_user(&mut conn, id).await?,
        None => None,
    };

    Ok(fhir::to_client_json(report, &author, reviewer.as_ref()))
}
