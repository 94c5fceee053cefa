//! rdr-dr library - Deceased Reports service
//!
//! REST surface, lifecycle engine, and import reconciler for deceased
//! participant reports.

use axum::Router;
use sqlx::SqlitePool;

pub mod api;
pub mod db;
pub mod fhir;
pub mod importer;
pub mod lifecycle;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Shared secret for operations-endpoint authentication
    pub shared_secret: i64,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, shared_secret: i64) -> Self {
        Self { db, shared_secret }
    }
}

/// Build application router
///
/// Operations endpoints (listing, import trigger) require the shared-secret
/// header; report submission/review and the health endpoint do not carry
/// auth here (platform-level authentication fronts this service).
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;

    // Operations-role routes (require authentication)
    let protected = Router::new()
        .route("/api/deceased-reports", get(api::list_reports))
        .route("/api/import/deceased-reports", post(api::trigger_import))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Participant-scoped routes
    let public = Router::new()
        .route(
            "/api/participant/:id/observation",
            post(api::create_observation),
        )
        .route(
            "/api/participant/:id/observation/:report_id/review",
            post(api::review_observation),
        )
        .route(
            "/api/participant/:id/summary",
            get(api::get_participant_summary),
        )
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
