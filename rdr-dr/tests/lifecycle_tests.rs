//! Engine-level lifecycle tests
//!
//! Drives the lifecycle engine directly (no HTTP) through sequences of
//! create/review operations and checks the standing invariants.

use chrono::{TimeZone, Utc};
use rdr_common::db::init_database;
use rdr_common::db::models::{DeceasedNotification, DenialReason, ReportStatus};
use rdr_common::Error;
use rdr_dr::db::participants;
use rdr_dr::fhir::{ReportSubmission, ReviewDecision};
use rdr_dr::lifecycle;
use sqlx::SqlitePool;
use tempfile::TempDir;

const PID: i64 = 401;

async fn setup_test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().expect("create temp dir");
    let pool = init_database(&dir.path().join("rdr.db"))
        .await
        .expect("initialize database");

    participants::upsert_organization(&pool, "PITT", "University of Pittsburgh")
        .await
        .unwrap();
    participants::upsert_participant(&pool, PID, Some("PITT"))
        .await
        .unwrap();

    (dir, pool)
}

fn ehr_submission() -> ReportSubmission {
    ReportSubmission {
        notification: DeceasedNotification::Ehr,
        notification_other: None,
        reporter_name: None,
        reporter_relationship: None,
        reporter_email: None,
        reporter_phone: None,
        author_system: "healthpro".to_string(),
        author_username: "staff@example.org".to_string(),
        authored: Utc.with_ymd_and_hms(2020, 1, 5, 13, 43, 21).unwrap(),
        date_of_death: None,
        cause_of_death: None,
    }
}

fn approval() -> ReviewDecision {
    ReviewDecision {
        status: ReportStatus::Approved,
        reviewer_system: "healthpro".to_string(),
        reviewer_username: "reviewer@example.org".to_string(),
        reviewed: Utc.with_ymd_and_hms(2020, 2, 1, 10, 0, 0).unwrap(),
        date_of_death: None,
        denial_reason: None,
        denial_reason_other: None,
    }
}

fn denial(reason: DenialReason, other: Option<&str>) -> ReviewDecision {
    ReviewDecision {
        status: ReportStatus::Denied,
        denial_reason: Some(reason),
        denial_reason_other: other.map(str::to_string),
        ..approval()
    }
}

async fn active_count(pool: &SqlitePool, pid: i64) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM deceased_reports
        WHERE participant_id = ? AND status IN ('PENDING', 'APPROVED')
        "#,
    )
    .bind(pid)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_active_report_count_never_exceeds_one() {
    let (_dir, pool) = setup_test_db().await;

    // create -> deny -> create -> deny -> create -> approve -> create(conflict)
    let r1 = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();
    assert!(active_count(&pool, PID).await <= 1);

    lifecycle::review_report(&pool, r1.id, denial(DenialReason::MarkedInError, None))
        .await
        .unwrap();
    assert_eq!(active_count(&pool, PID).await, 0);

    let r2 = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();
    assert_eq!(active_count(&pool, PID).await, 1);

    lifecycle::review_report(&pool, r2.id, denial(DenialReason::InsufficientInformation, None))
        .await
        .unwrap();

    let r3 = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();
    lifecycle::review_report(&pool, r3.id, approval()).await.unwrap();
    assert_eq!(active_count(&pool, PID).await, 1);

    let conflict = lifecycle::create_report(&pool, PID, ehr_submission()).await;
    assert!(matches!(conflict, Err(Error::Conflict(_))));
    assert_eq!(active_count(&pool, PID).await, 1);

    // Denied reports accumulate freely
    let denied: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM deceased_reports WHERE participant_id = ? AND status = 'DENIED'",
    )
    .bind(PID)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(denied, 2);
}

#[tokio::test]
async fn test_author_identity_resolves_to_same_row() {
    let (_dir, pool) = setup_test_db().await;

    let r1 = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();
    lifecycle::review_report(&pool, r1.id, denial(DenialReason::MarkedInError, None))
        .await
        .unwrap();
    let r2 = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();

    // Same (system, username) across reports maps to one api_users row
    assert_eq!(r1.author_id, r2.author_id);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM api_users WHERE system = 'healthpro' AND username = 'staff@example.org'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_denial_requires_reason() {
    let (_dir, pool) = setup_test_db().await;

    let report = lifecycle::create_report(&pool, PID, ehr_submission()).await.unwrap();

    let mut decision = approval();
    decision.status = ReportStatus::Denied;
    let result = lifecycle::review_report(&pool, report.id, decision).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    // OTHER without a description is also rejected; the report stays PENDING
    let result =
        lifecycle::review_report(&pool, report.id, denial(DenialReason::Other, None)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let reviewed = lifecycle::review_report(
        &pool,
        report.id,
        denial(DenialReason::Other, Some("Duplicate filing")),
    )
    .await
    .unwrap();
    assert_eq!(reviewed.status, ReportStatus::Denied);
    assert_eq!(reviewed.denial_reason_other.as_deref(), Some("Duplicate filing"));
}

#[tokio::test]
async fn test_engine_rejects_missing_reporter_for_kin_category() {
    let (_dir, pool) = setup_test_db().await;

    // Importer-style submission that skipped structural validation
    let mut submission = ehr_submission();
    submission.notification = DeceasedNotification::NextKinHpo;
    let result = lifecycle::create_report(&pool, PID, submission).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    // Nothing was persisted
    assert_eq!(active_count(&pool, PID).await, 0);
}
