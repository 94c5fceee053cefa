//! REDCap API client
//!
//! Fetches deceased-report survey records from the external survey system.
//! One POST per batch run; a failed fetch propagates and aborts the whole
//! sweep (retry is the scheduler's job, not ours).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// REDCap client errors
#[derive(Debug, Error)]
pub enum RedcapError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One deceased-report survey record as exported by REDCap
///
/// REDCap exports every field as a string; empty string means unanswered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeathRecord {
    /// Participant id the record refers to
    pub record_id: String,
    /// "1" when the external system confirmed the decedent's identity
    pub identity_confirmed: String,
    /// Reporter type code: "1" = other, "2" = kin/support
    pub reporter_type: String,
    pub reporter_first_name: String,
    pub reporter_last_name: String,
    /// Relationship code table: 1=PARENT 2=CHILD 3=SIBLING 4=SPOUSE 5=OTHER
    pub reporter_relationship: String,
    pub reporter_email: String,
    pub reporter_phone: String,
    /// Explicit "report death date"; preferred authored timestamp
    pub report_death_date: String,
    /// Survey completion timestamp; authored fallback
    pub survey_completed: String,
    pub date_of_death: String,
    pub cause_of_death: String,
}

/// REDCap API client
pub struct RedcapClient {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
}

impl RedcapClient {
    pub fn new(api_url: String, api_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_token,
        }
    }

    /// Fetch all records completed since the given timestamp
    pub async fn get_records(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DeathRecord>, RedcapError> {
        let date_range_begin = since.format("%Y-%m-%d %H:%M:%S").to_string();
        let params = [
            ("token", self.api_token.as_str()),
            ("content", "record"),
            ("format", "json"),
            ("type", "flat"),
            ("dateRangeBegin", date_range_begin.as_str()),
        ];

        let response = self
            .http
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RedcapError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RedcapError::Api(status.as_u16(), body));
        }

        response
            .json::<Vec<DeathRecord>>()
            .await
            .map_err(|e| RedcapError::Parse(e.to_string()))
    }
}
