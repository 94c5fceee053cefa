//! Import trigger endpoint (operations role)
//!
//! The scheduler invokes this to run one import sweep. The REDCap endpoint
//! and token come from the settings table; an empty endpoint means the
//! import has not been configured for this deployment.

use axum::{extract::State, Json};
use rdr_common::db::settings;
use rdr_common::{time, Error};
use serde::Deserialize;

use crate::api::ApiError;
use crate::importer::{self, redcap::RedcapClient, ImportOutcome};
use crate::AppState;

/// Request body for the import trigger
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    /// RFC 3339 lower bound; defaults to the start of the previous day
    pub since: Option<String>,
}

/// POST /api/import/deceased-reports
pub async fn trigger_import(
    State(state): State<AppState>,
    body: Option<Json<ImportRequest>>,
) -> Result<Json<ImportOutcome>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let since = request
        .since
        .as_deref()
        .map(time::parse_client_timestamp)
        .transpose()?;

    let api_url = settings::get_setting(&state.db, settings::KEY_REDCAP_API_URL)
        .await?
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::Config("redcap_api_url is not configured".to_string()))?;
    let api_token = settings::get_setting(&state.db, settings::KEY_REDCAP_API_TOKEN)
        .await?
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Config("redcap_api_token is not configured".to_string()))?;

    let client = RedcapClient::new(api_url, api_token);
    let outcome = importer::run_import(&state.db, &client, since).await?;

    Ok(Json(outcome))
}
