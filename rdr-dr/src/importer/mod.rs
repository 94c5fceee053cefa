//! Deceased report import reconciler
//!
//! Batch sweep over external survey records. Each record is processed
//! independently: a failure on one record is logged with the external record
//! id and never aborts the batch. Only the upstream fetch itself propagates.

pub mod redcap;

use rdr_common::db::models::{DeceasedNotification, ReporterRelationship};
use rdr_common::db::settings;
use rdr_common::{time, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::fhir::ReportSubmission;
use crate::lifecycle;
use redcap::{DeathRecord, RedcapClient};

/// Fixed description stored when the survey's "other" reporter type is used
const PORTAL_NOTIFICATION_OTHER: &str = "Death reported through participant portal";

/// ApiUser system for identities derived from email addresses
const AUTHOR_SYSTEM_EMAIL: &str = "email";

/// Outcome counters for one import sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub fetched: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// What became of a single record
enum Disposition {
    Created,
    Skipped,
}

/// Run one import sweep
///
/// `since` defaults to the start of the previous calendar day. The fetch
/// itself is the only failure that aborts the run.
pub async fn run_import(
    pool: &SqlitePool,
    client: &RedcapClient,
    since: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<ImportOutcome> {
    let since = since.unwrap_or_else(time::start_of_previous_day);
    info!("Starting deceased report import (since {})", time::format_timestamp(since));

    let records = client
        .get_records(since)
        .await
        .map_err(|e| Error::Upstream(e.to_string()))?;

    let outcome = process_records(pool, &records).await;
    info!(
        "Deceased report import complete: {} fetched, {} created, {} skipped, {} failed",
        outcome.fetched, outcome.created, outcome.skipped, outcome.failed
    );
    Ok(outcome)
}

/// Process a batch of fetched records with per-record failure isolation
pub async fn process_records(pool: &SqlitePool, records: &[DeathRecord]) -> ImportOutcome {
    let mut outcome = ImportOutcome {
        fetched: records.len(),
        ..Default::default()
    };

    for record in records {
        match process_record(pool, record).await {
            Ok(Disposition::Created) => outcome.created += 1,
            Ok(Disposition::Skipped) => outcome.skipped += 1,
            Err(e) => {
                error!("Failed to import record {}: {}", record.record_id, e);
                outcome.failed += 1;
            }
        }
    }

    outcome
}

async fn process_record(pool: &SqlitePool, record: &DeathRecord) -> Result<Disposition> {
    // Unconfirmed identity: no log, no side effect, regardless of how many
    // times the importer sees the record.
    if record.identity_confirmed != "1" {
        return Ok(Disposition::Skipped);
    }

    let participant_id: i64 = record
        .record_id
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid record id: {}", record.record_id)))?;

    let submission = match build_submission(pool, record).await? {
        Some(submission) => submission,
        None => {
            warn!(
                "Skipping record {}: unrecognized reporter type code {:?}",
                record.record_id, record.reporter_type
            );
            return Ok(Disposition::Skipped);
        }
    };

    lifecycle::create_report(pool, participant_id, submission).await?;
    Ok(Disposition::Created)
}

/// Map one survey record to a report submission
///
/// Returns None for an unrecognized reporter type code (warn-and-skip, not a
/// hard error).
async fn build_submission(
    pool: &SqlitePool,
    record: &DeathRecord,
) -> Result<Option<ReportSubmission>> {
    let support_desk = settings::get_setting(pool, settings::KEY_SUPPORT_DESK_EMAIL)
        .await?
        .unwrap_or_else(|| "support@rdr-platform.org".to_string());

    let (notification, notification_other, author_username, reporter) =
        match record.reporter_type.as_str() {
            // "Other" reporter: author is the reporter's own email when given,
            // the support desk otherwise.
            "1" => {
                let author = if record.reporter_email.is_empty() {
                    support_desk
                } else {
                    record.reporter_email.clone()
                };
                (
                    DeceasedNotification::Other,
                    Some(PORTAL_NOTIFICATION_OTHER.to_string()),
                    author,
                    None,
                )
            }
            // Kin/support reporter: the support desk files the record, the
            // next of kin is carried as the reporter.
            "2" => {
                let reporter = build_kin_reporter(record)?;
                (
                    DeceasedNotification::NextKinSupport,
                    None,
                    support_desk,
                    Some(reporter),
                )
            }
            _ => return Ok(None),
        };

    let date_of_death = optional(&record.date_of_death)
        .map(|s| time::parse_client_date(s))
        .transpose()?;
    let cause_of_death = optional(&record.cause_of_death).map(str::to_string);

    // Prefer the explicit report death date; fall back to survey completion
    let authored_source = optional(&record.report_death_date)
        .or_else(|| optional(&record.survey_completed))
        .ok_or_else(|| {
            Error::InvalidInput("Record has neither report death date nor completion time".to_string())
        })?;
    let authored = time::parse_client_timestamp(authored_source)?;

    let (reporter_name, reporter_relationship, reporter_email, reporter_phone) = match reporter {
        Some(r) => (Some(r.name), Some(r.relationship), r.email, r.phone),
        None => (None, None, None, None),
    };

    Ok(Some(ReportSubmission {
        notification,
        notification_other,
        reporter_name,
        reporter_relationship,
        reporter_email,
        reporter_phone,
        author_system: AUTHOR_SYSTEM_EMAIL.to_string(),
        author_username,
        authored,
        date_of_death,
        cause_of_death,
    }))
}

struct KinReporter {
    name: String,
    relationship: String,
    email: Option<String>,
    phone: Option<String>,
}

fn build_kin_reporter(record: &DeathRecord) -> Result<KinReporter> {
    // Both name halves are mandatory for kin/support records
    let first = optional(&record.reporter_first_name)
        .ok_or_else(|| Error::InvalidInput("Missing reporter first name".to_string()))?;
    let last = optional(&record.reporter_last_name)
        .ok_or_else(|| Error::InvalidInput("Missing reporter last name".to_string()))?;

    let code: i64 = record
        .reporter_relationship
        .parse()
        .map_err(|_| {
            Error::InvalidInput(format!(
                "Invalid relationship code: {:?}",
                record.reporter_relationship
            ))
        })?;
    let relationship = ReporterRelationship::from_survey_code(code)?;

    Ok(KinReporter {
        name: format!("{} {}", first, last),
        relationship: relationship.as_str().to_string(),
        email: optional(&record.reporter_email).map(str::to_string),
        phone: optional(&record.reporter_phone).map(str::to_string),
    })
}

/// REDCap exports unanswered fields as empty strings
fn optional(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
