//! Integration tests for rdr-dr API endpoints
//!
//! Tests cover:
//! - Report creation: validation order, auto-approval, conflict detection
//! - Review: one-shot transition, denial reasons, summary projection
//! - Listing with status/organization filters and operations auth
//! - Summary reads with the deceased-PII redaction window
//! - Timestamp normalization across the wire format

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rdr_common::db::{init_database, settings};
use rdr_dr::db::{participants, summary};
use rdr_dr::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const PAIRED_PID: i64 = 101;
const UNPAIRED_PID: i64 = 201;

/// Test helper: fresh database with one organization and two participants
async fn setup_test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().expect("create temp dir");
    let pool = init_database(&dir.path().join("rdr.db"))
        .await
        .expect("initialize database");

    participants::upsert_organization(&pool, "PITT", "University of Pittsburgh")
        .await
        .unwrap();
    participants::upsert_participant(&pool, PAIRED_PID, Some("PITT"))
        .await
        .unwrap();
    participants::upsert_participant(&pool, UNPAIRED_PID, None)
        .await
        .unwrap();

    (dir, pool)
}

/// Test helper: create app with test state (auth disabled)
fn setup_app(db: SqlitePool) -> axum::Router {
    // shared_secret=0 disables operations auth
    let state = AppState::new(db, 0);
    build_router(state)
}

/// Test helper: JSON POST request
fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Test helper: GET request
fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Minimal valid EHR-notification creation body
fn ehr_request(issued: &str) -> Value {
    json!({
        "code": {"text": "DeceasedReport"},
        "status": "preliminary",
        "encounter": {"reference": "EHR"},
        "performer": [{"type": "healthpro", "reference": "staff@example.org"}],
        "issued": issued
    })
}

fn review_request(status: &str) -> Value {
    json!({
        "code": {"text": "DeceasedReport"},
        "status": status,
        "performer": [{"type": "healthpro", "reference": "reviewer@example.org"}],
        "issued": "2020-02-01T10:00:00Z"
    })
}

async fn create_report(app: &axum::Router, participant_id: i64, body: &Value) -> (StatusCode, Value) {
    let uri = format!("/api/participant/{}/observation", participant_id);
    let response = app.clone().oneshot(post_json(&uri, body)).await.unwrap();
    let status = response.status();
    let json = extract_json(response.into_body()).await;
    (status, json)
}

async fn review_report(
    app: &axum::Router,
    participant_id: i64,
    report_id: i64,
    body: &Value,
) -> (StatusCode, Value) {
    let uri = format!(
        "/api/participant/{}/observation/{}/review",
        participant_id, report_id
    );
    let response = app.clone().oneshot(post_json(&uri, body)).await.unwrap();
    let status = response.status();
    let json = extract_json(response.into_body()).await;
    (status, json)
}

fn report_id(body: &Value) -> i64 {
    body["identifier"]["value"].as_str().unwrap().parse().unwrap()
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "rdr-dr");
    assert!(body["version"].is_string());
}

// =============================================================================
// Report Creation
// =============================================================================

#[tokio::test]
async fn test_create_pending_for_paired_participant() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool.clone());

    let (status, body) =
        create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "preliminary");
    assert_eq!(body["subject"]["reference"], format!("Participant/{}", PAIRED_PID));

    // Summary projected as PENDING
    let row = summary::get_summary(&pool, PAIRED_PID).await.unwrap().unwrap();
    assert_eq!(row.deceased_status.as_str(), "PENDING");
}

#[tokio::test]
async fn test_create_auto_approves_unpaired_participant() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool.clone());

    let mut request = ehr_request("2020-01-05T13:43:21Z");
    request["effectiveDateTime"] = json!("2020-01-02");

    let (status, body) = create_report(&app, UNPAIRED_PID, &request).await;
    assert_eq!(status, StatusCode::OK);

    // Review step skipped, not separately recorded
    assert_eq!(body["status"], "final");
    assert_eq!(body["effectiveDateTime"], "2020-01-02");
    assert_eq!(body["performer"].as_array().unwrap().len(), 1);

    let row = summary::get_summary(&pool, UNPAIRED_PID).await.unwrap().unwrap();
    assert_eq!(row.deceased_status.as_str(), "APPROVED");
    assert_eq!(
        rdr_common::time::format_timestamp(row.deceased_authored.unwrap()),
        "2020-01-05T13:43:21Z"
    );
    assert_eq!(row.date_of_death.unwrap().to_string(), "2020-01-02");
}

#[tokio::test]
async fn test_create_normalizes_offset_timestamp_to_utc() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (status, body) =
        create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21-06:00")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["issued"], "2020-01-05T19:43:21Z");
}

#[tokio::test]
async fn test_create_unknown_participant_not_found() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (status, body) = create_report(&app, 999999, &ehr_request("2020-01-05T13:43:21Z")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Participant"));
}

#[tokio::test]
async fn test_create_invalid_status_rejected() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let mut request = ehr_request("2020-01-05T13:43:21Z");
    request["status"] = json!("final");
    let (status, _) = create_report(&app, PAIRED_PID, &request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_conflicts_with_active_report() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (status, _) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    assert_eq!(status, StatusCode::OK);

    // Second creation while PENDING exists
    let (status, body) =
        create_report(&app, PAIRED_PID, &ehr_request("2020-01-06T09:00:00Z")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("active"));
}

#[tokio::test]
async fn test_resubmission_allowed_after_denial() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (_, body) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    let id = report_id(&body);

    let mut deny = review_request("cancelled");
    deny["extension"] = json!([{
        "url": rdr_dr::fhir::EXT_DENIAL_REASON,
        "valueReference": {"reference": "INCORRECT_PARTICIPANT"}
    }]);
    let (status, _) = review_report(&app, PAIRED_PID, id, &deny).await;
    assert_eq!(status, StatusCode::OK);

    // A denied report does not block a fresh submission
    let (status, _) = create_report(&app, PAIRED_PID, &ehr_request("2020-02-05T08:00:00Z")).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Review
// =============================================================================

#[tokio::test]
async fn test_approve_projects_summary() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool.clone());

    let (_, body) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    let id = report_id(&body);

    let mut approve = review_request("final");
    approve["effectiveDateTime"] = json!("2020-01-03");
    let (status, body) = review_report(&app, PAIRED_PID, id, &approve).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "final");
    // Review-time effectiveDateTime overwrites the date of death
    assert_eq!(body["effectiveDateTime"], "2020-01-03");

    let row = summary::get_summary(&pool, PAIRED_PID).await.unwrap().unwrap();
    assert_eq!(row.deceased_status.as_str(), "APPROVED");
    assert_eq!(
        rdr_common::time::format_timestamp(row.deceased_authored.unwrap()),
        "2020-02-01T10:00:00Z"
    );
}

#[tokio::test]
async fn test_denial_leaves_summary_unset() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool.clone());

    let (_, body) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    let id = report_id(&body);

    let mut deny = review_request("cancelled");
    deny["extension"] = json!([{
        "url": rdr_dr::fhir::EXT_DENIAL_REASON,
        "valueReference": {"reference": "MARKED_IN_ERROR"}
    }]);
    let (status, body) = review_report(&app, PAIRED_PID, id, &deny).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // A denial does not mark the participant deceased
    let row = summary::get_summary(&pool, PAIRED_PID).await.unwrap().unwrap();
    assert_eq!(row.deceased_status.as_str(), "UNSET");
    assert!(row.deceased_authored.is_none());
    assert!(row.date_of_death.is_none());
}

#[tokio::test]
async fn test_review_is_one_shot() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (_, body) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    let id = report_id(&body);

    let (status, first) = review_report(&app, PAIRED_PID, id, &review_request("final")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "final");

    // Second review fails and the terminal fields are unchanged
    let (status, _) = review_report(&app, PAIRED_PID, id, &review_request("final")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = review_report(&app, PAIRED_PID, id, &review_request("cancelled")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/api/deceased-reports"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "final");
    assert_eq!(body[0]["performer"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_denial_other_requires_description() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (_, body) = create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    let id = report_id(&body);

    let mut deny = review_request("cancelled");
    deny["extension"] = json!([{
        "url": rdr_dr::fhir::EXT_DENIAL_REASON,
        "valueReference": {"reference": "OTHER"}
    }]);
    let (status, _) = review_report(&app, PAIRED_PID, id, &deny).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    deny["extension"][0]["valueReference"]["display"] = json!("Filed against the wrong cohort");
    let (status, body) = review_report(&app, PAIRED_PID, id, &deny).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn test_review_unknown_report_not_found() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let (status, _) = review_report(&app, PAIRED_PID, 424242, &review_request("final")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Listing and Operations Auth
// =============================================================================

#[tokio::test]
async fn test_list_filters_by_status_and_org() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    // Paired participant: stays PENDING. Unpaired: auto-approved.
    create_report(&app, PAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    create_report(&app, UNPAIRED_PID, &ehr_request("2020-01-06T09:00:00Z")).await;

    let response = app.clone().oneshot(get("/api/deceased-reports")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let all = body.as_array().unwrap();
    assert_eq!(all.len(), 2);
    // Ordered by authored descending
    assert_eq!(all[0]["issued"], "2020-01-06T09:00:00Z");

    let response = app
        .clone()
        .oneshot(get("/api/deceased-reports?status=preliminary"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["subject"]["reference"], format!("Participant/{}", PAIRED_PID));

    let response = app
        .clone()
        .oneshot(get("/api/deceased-reports?org_id=PITT"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Sentinel for unpaired participants
    let response = app
        .clone()
        .oneshot(get("/api/deceased-reports?org_id=UNSET"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "final");
}

#[tokio::test]
async fn test_list_unknown_org_not_found() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let response = app
        .oneshot(get("/api/deceased-reports?org_id=NOWHERE"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_requires_operations_secret() {
    let (_dir, pool) = setup_test_db().await;
    let state = AppState::new(pool, 424242);
    let app = build_router(state);

    let response = app.clone().oneshot(get("/api/deceased-reports")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("GET")
        .uri("/api/deceased-reports")
        .header("x-api-secret", "424242")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Summary Redaction
// =============================================================================

#[tokio::test]
async fn test_summary_redacted_after_grace_window() {
    let (_dir, pool) = setup_test_db().await;
    summary::upsert_contact_info(
        &pool,
        UNPAIRED_PID,
        Some("555-0100"),
        Some("p@example.com"),
        Some("1 Main St"),
        Some("PHONE"),
    )
    .await
    .unwrap();
    let app = setup_app(pool);

    // Auto-approved report authored far outside any grace window
    let (status, _) =
        create_report(&app, UNPAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/participant/{}/summary", UNPAIRED_PID);
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deceasedStatus"], "APPROVED");
    assert!(body["phone"].is_null());
    assert!(body["email"].is_null());
    assert!(body["address"].is_null());
    assert_eq!(body["recontactMethod"], "NO_CONTACT");
}

#[tokio::test]
async fn test_summary_visible_within_grace_window() {
    let (_dir, pool) = setup_test_db().await;
    summary::upsert_contact_info(
        &pool,
        UNPAIRED_PID,
        Some("555-0100"),
        Some("p@example.com"),
        None,
        Some("PHONE"),
    )
    .await
    .unwrap();
    let app = setup_app(pool);

    let issued = rdr_common::time::format_timestamp(rdr_common::time::now());
    let (status, _) = create_report(&app, UNPAIRED_PID, &ehr_request(&issued)).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/participant/{}/summary", UNPAIRED_PID);
    let response = app.oneshot(get(&uri)).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deceasedStatus"], "APPROVED");
    assert_eq!(body["phone"], "555-0100");
    assert_eq!(body["email"], "p@example.com");
    assert_eq!(body["recontactMethod"], "PHONE");
}

#[tokio::test]
async fn test_summary_defaults_for_participant_without_reports() {
    let (_dir, pool) = setup_test_db().await;
    let app = setup_app(pool);

    let uri = format!("/api/participant/{}/summary", PAIRED_PID);
    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deceasedStatus"], "UNSET");
    assert!(body["deceasedAuthored"].is_null());
    assert!(body["dateOfDeath"].is_null());

    let response = app.oneshot(get("/api/participant/999999/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_grace_window_is_configurable() {
    let (_dir, pool) = setup_test_db().await;
    summary::upsert_contact_info(&pool, UNPAIRED_PID, Some("555-0100"), None, None, None)
        .await
        .unwrap();
    // Extend the window far enough to cover a 2020 report
    settings::set_setting(&pool, settings::KEY_GRACE_PERIOD_DAYS, "36500")
        .await
        .unwrap();
    let app = setup_app(pool);

    create_report(&app, UNPAIRED_PID, &ehr_request("2020-01-05T13:43:21Z")).await;

    let uri = format!("/api/participant/{}/summary", UNPAIRED_PID);
    let response = app.oneshot(get(&uri)).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["phone"], "555-0100");
}
