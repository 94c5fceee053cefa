//! Deceased report lifecycle engine
//!
//! The core state machine. Reports are created PENDING (or auto-approved for
//! unpaired participants) and transition exactly once via review to APPROVED
//! or DENIED. The report write and the participant-summary projection commit
//! in one transaction so the two can never be observably inconsistent.

use rdr_common::db::models::{
    DeceasedNotification, DeceasedReport, DeceasedStatus, DenialReason, ReportStatus,
};
use rdr_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{api_users, participants, reports, summary};
use crate::fhir::{ReportSubmission, ReviewDecision};

/// Create a deceased report for a participant
///
/// Unknown participant fails NotFound; an existing PENDING or APPROVED report
/// fails Conflict (any number of DENIED reports may accumulate). Unpaired
/// participants skip review entirely: the report is created APPROVED with
/// reviewer and reviewed left unset.
pub async fn create_report(
    pool: &SqlitePool,
    participant_id: i64,
    submission: ReportSubmission,
) -> Result<DeceasedReport> {
    validate_submission(&submission)?;

    let mut tx = pool.begin().await?;

    let participant = participants::get_participant(&mut tx, participant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Participant {}", participant_id)))?;

    if reports::has_active_report(&mut tx, participant_id).await? {
        return Err(Error::Conflict(format!(
            "Participant {} already has an active deceased report",
            participant_id
        )));
    }

    let author_id = api_users::load_or_init(
        &mut tx,
        &submission.author_system,
        &submission.author_username,
    )
    .await?;

    // No awardee organization means no second-party oversight is required:
    // the report is approved at creation and the review step is skipped.
    let status = if participant.organization_external_id.is_none() {
        ReportStatus::Approved
    } else {
        ReportStatus::Pending
    };

    let mut report = DeceasedReport {
        id: 0,
        participant_id,
        status,
        notification: submission.notification,
        notification_other: submission.notification_other,
        reporter_name: submission.reporter_name,
        reporter_relationship: submission.reporter_relationship,
        reporter_email: submission.reporter_email,
        reporter_phone: submission.reporter_phone,
        author_id,
        authored: submission.authored,
        reviewer_id: None,
        reviewed: None,
        date_of_death: submission.date_of_death,
        cause_of_death: submission.cause_of_death,
        denial_reason: None,
        denial_reason_other: None,
    };
    report.id = reports::insert_report(&mut tx, &report).await?;

    let projected = match status {
        ReportStatus::Approved => DeceasedStatus::Approved,
        _ => DeceasedStatus::Pending,
    };
    summary::set_deceased_state(
        &mut tx,
        participant_id,
        projected,
        Some(report.authored),
        report.date_of_death,
    )
    .await?;

    tx.commit().await?;

    info!(
        "Created deceased report {} for participant {} ({})",
        report.id,
        participant_id,
        status.as_str()
    );

    Ok(report)
}

/// Review a pending report: approve ("final") or deny ("cancelled")
///
/// Approved and denied are terminal; a second review fails InvalidInput with
/// the report unchanged. Approval projects the deceased state onto the
/// participant summary; denial resets the summary deceased fields so a
/// denied report never marks the participant deceased.
pub async fn review_report(
    pool: &SqlitePool,
    report_id: i64,
    decision: ReviewDecision,
) -> Result<DeceasedReport> {
    validate_decision(&decision)?;

    let mut tx = pool.begin().await?;

    let report = reports::get_report(&mut tx, report_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Deceased report {}", report_id)))?;

    if report.status != ReportStatus::Pending {
        return Err(Error::InvalidInput(format!(
            "Deceased report {} is {} and cannot be reviewed again",
            report_id,
            report.status.as_str()
        )));
    }

    let reviewer_id = api_users::load_or_init(
        &mut tx,
        &decision.reviewer_system,
        &decision.reviewer_username,
    )
    .await?;

    // A new effectiveDateTime overwrites the date of death; otherwise the
    // creation-time value stands.
    let date_of_death = decision.date_of_death.or(report.date_of_death);

    reports::update_review(
        &mut tx,
        report_id,
        decision.status,
        reviewer_id,
        decision.reviewed,
        date_of_death,
        decision.denial_reason,
        decision.denial_reason_other.as_deref(),
    )
    .await?;

    match decision.status {
        ReportStatus::Approved => {
            summary::set_deceased_state(
                &mut tx,
                report.participant_id,
                DeceasedStatus::Approved,
                Some(decision.reviewed),
                date_of_death,
            )
            .await?;
        }
        ReportStatus::Denied => {
            summary::set_deceased_state(
                &mut tx,
                report.participant_id,
                DeceasedStatus::Unset,
                None,
                None,
            )
            .await?;
        }
        ReportStatus::Pending => unreachable!("validated above"),
    }

    let updated = reports::get_report(&mut tx, report_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Report {} vanished mid-review", report_id)))?;

    tx.commit().await?;

    info!(
        "Reviewed deceased report {} for participant {} ({})",
        report_id,
        report.participant_id,
        decision.status.as_str()
    );

    Ok(updated)
}

/// Domain invariants enforced regardless of entry path (API or importer)
fn validate_submission(submission: &ReportSubmission) -> Result<()> {
    if submission.notification == DeceasedNotification::Other
        && submission.notification_other.is_none()
    {
        return Err(Error::InvalidInput(
            "Notification OTHER requires a description".to_string(),
        ));
    }

    if submission.notification.requires_reporter() {
        if submission.reporter_name.is_none() {
            return Err(Error::InvalidInput("Missing reporter name".to_string()));
        }
        if submission.reporter_relationship.is_none() {
            return Err(Error::InvalidInput(
                "Missing reporter relationship".to_string(),
            ));
        }
    }

    if submission.author_system.is_empty() || submission.author_username.is_empty() {
        return Err(Error::InvalidInput("Missing author identity".to_string()));
    }

    Ok(())
}

fn validate_decision(decision: &ReviewDecision) -> Result<()> {
    match decision.status {
        ReportStatus::Pending => Err(Error::InvalidInput(
            "Review status must be \"final\" or \"cancelled\"".to_string(),
        )),
        ReportStatus::Denied => {
            let reason = decision
                .denial_reason
                .ok_or_else(|| Error::InvalidInput("Denial requires a reason".to_string()))?;
            if reason == DenialReason::Other && decision.denial_reason_other.is_none() {
                return Err(Error::InvalidInput(
                    "Denial reason OTHER requires a description".to_string(),
                ));
            }
            Ok(())
        }
        ReportStatus::Approved => Ok(()),
    }
}
