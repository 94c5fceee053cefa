//! Deceased report store
//!
//! Persistence boundary for report rows. The single-active-report rule is
//! checked here (`has_active_report`) inside the engine's transaction; the
//! partial unique index created at init time rejects racing duplicates.

use chrono::NaiveDate;
use rdr_common::db::models::{DeceasedNotification, DeceasedReport, DenialReason, ReportStatus};
use rdr_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Organization filter for report listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgFilter {
    /// Reports for participants paired to this organization
    Organization(String),
    /// Reports for unpaired participants (sentinel "UNSET")
    Unpaired,
}

const REPORT_COLUMNS: &str = r#"
    id, participant_id, status, notification, notification_other,
    reporter_name, reporter_relationship, reporter_email, reporter_phone,
    author_id, authored, reviewer_id, reviewed,
    date_of_death, cause_of_death, denial_reason, denial_reason_other
"#;

fn row_to_report(row: &SqliteRow) -> Result<DeceasedReport> {
    let authored: String = row.get("authored");
    let reviewed: Option<String> = row.get("reviewed");
    let date_of_death: Option<String> = row.get("date_of_death");
    let denial_reason: Option<String> = row.get("denial_reason");
    let status: String = row.get("status");
    let notification: String = row.get("notification");

    Ok(DeceasedReport {
        id: row.get("id"),
        participant_id: row.get("participant_id"),
        status: ReportStatus::parse(&status)?,
        notification: DeceasedNotification::parse(&notification)?,
        notification_other: row.get("notification_other"),
        reporter_name: row.get("reporter_name"),
        reporter_relationship: row.get("reporter_relationship"),
        reporter_email: row.get("reporter_email"),
        reporter_phone: row.get("reporter_phone"),
        author_id: row.get("author_id"),
        authored: time::parse_stored_timestamp(&authored)?,
        reviewer_id: row.get("reviewer_id"),
        reviewed: reviewed
            .map(|s| time::parse_stored_timestamp(&s))
            .transpose()?,
        date_of_death: date_of_death
            .map(|s| time::parse_client_date(&s))
            .transpose()?,
        cause_of_death: row.get("cause_of_death"),
        denial_reason: denial_reason
            .map(|s| DenialReason::parse(&s))
            .transpose()?,
        denial_reason_other: row.get("denial_reason_other"),
    })
}

/// Whether the participant has a report in {PENDING, APPROVED}
pub async fn has_active_report(
    conn: &mut SqliteConnection,
    participant_id: i64,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM deceased_reports
        WHERE participant_id = ? AND status IN ('PENDING', 'APPROVED')
        "#,
    )
    .bind(participant_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

/// Insert a report row, returning the assigned id
pub async fn insert_report(
    conn: &mut SqliteConnection,
    report: &DeceasedReport,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO deceased_reports (
            participant_id, status, notification, notification_other,
            reporter_name, reporter_relationship, reporter_email, reporter_phone,
            author_id, authored, date_of_death, cause_of_death
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.participant_id)
    .bind(report.status.as_str())
    .bind(report.notification.as_str())
    .bind(&report.notification_other)
    .bind(&report.reporter_name)
    .bind(&report.reporter_relationship)
    .bind(&report.reporter_email)
    .bind(&report.reporter_phone)
    .bind(report.author_id)
    .bind(time::format_timestamp(report.authored))
    .bind(report.date_of_death.map(|d| d.to_string()))
    .bind(&report.cause_of_death)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Fetch a report by id
pub async fn get_report(
    conn: &mut SqliteConnection,
    report_id: i64,
) -> Result<Option<DeceasedReport>> {
    let sql = format!("SELECT {} FROM deceased_reports WHERE id = ?", REPORT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_report).transpose()
}

/// Apply a review decision to a report row
pub async fn update_review(
    conn: &mut SqliteConnection,
    report_id: i64,
    status: ReportStatus,
    reviewer_id: i64,
    reviewed: chrono::DateTime<chrono::Utc>,
    date_of_death: Option<NaiveDate>,
    denial_reason: Option<DenialReason>,
    denial_reason_other: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE deceased_reports
        SET status = ?,
            reviewer_id = ?,
            reviewed = ?,
            date_of_death = ?,
            denial_reason = ?,
            denial_reason_other = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(reviewer_id)
    .bind(time::format_timestamp(reviewed))
    .bind(date_of_death.map(|d| d.to_string()))
    .bind(denial_reason.map(|r| r.as_str()))
    .bind(denial_reason_other)
    .bind(report_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// List reports ordered by authored timestamp descending
///
/// Optional status filter and organization filter (including the unpaired
/// sentinel). The caller validates organization existence beforehand.
pub async fn list_reports(
    pool: &SqlitePool,
    status: Option<ReportStatus>,
    org: Option<&OrgFilter>,
) -> Result<Vec<DeceasedReport>> {
    let mut sql = format!(
        "SELECT {} FROM deceased_reports WHERE 1 = 1",
        REPORT_COLUMNS
    );

    if status.is_some() {
        sql.push_str(" AND status = ?");
    }
    match org {
        Some(OrgFilter::Organization(_)) => {
            sql.push_str(
                r#" AND participant_id IN (
                    SELECT participant_id FROM participants
                    WHERE organization_external_id = ?)"#,
            );
        }
        Some(OrgFilter::Unpaired) => {
            sql.push_str(
                r#" AND participant_id IN (
                    SELECT participant_id FROM participants
                    WHERE organization_external_id IS NULL)"#,
            );
        }
        None => {}
    }
    sql.push_str(" ORDER BY authored DESC");

    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    if let Some(OrgFilter::Organization(external_id)) = org {
        query = query.bind(external_id);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_report).collect()
}
