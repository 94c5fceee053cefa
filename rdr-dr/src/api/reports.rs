//! Report listing endpoint (operations role)

use axum::{
    extract::{Query, State},
    Json,
};
use rdr_common::db::models::ReportStatus;
use rdr_common::Error;
use serde::Deserialize;

use crate::api::observations::serialize_report;
use crate::api::ApiError;
use crate::db::{participants, reports};
use crate::AppState;

/// Sentinel organization filter value for unpaired participants
const ORG_UNSET: &str = "UNSET";

/// Query parameters for report listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Status filter in client vocabulary (preliminary/final/cancelled)
    pub status: Option<String>,
    /// Organization external id, or "UNSET" for unpaired participants
    pub org_id: Option<String>,
}

/// GET /api/deceased-reports?status=&org_id=
///
/// Returns reports ordered by authored timestamp descending.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(ReportStatus::from_client)
        .transpose()?;

    let org = match query.org_id.as_deref() {
        None => None,
        Some(ORG_UNSET) => Some(reports::OrgFilter::Unpaired),
        Some(external_id) => {
            if !participants::organization_exists(&state.db, external_id).await? {
                return Err(Error::NotFound(format!("Organization {}", external_id)).into());
            }
            Some(reports::OrgFilter::Organization(external_id.to_string()))
        }
    };

    let found = reports::list_reports(&state.db, status, org.as_ref()).await?;

    let mut body = Vec::with_capacity(found.len());
    for report in &found {
        body.push(serialize_report(&state.db, report).await?);
    }

    Ok(Json(body))
}
