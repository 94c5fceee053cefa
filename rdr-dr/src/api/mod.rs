//! HTTP API handlers for rdr-dr

pub mod auth;
pub mod error;
pub mod health;
pub mod import;
pub mod observations;
pub mod reports;
pub mod summary;

pub use auth::auth_middleware;
pub use error::ApiError;
pub use health::health_routes;
pub use import::trigger_import;
pub use observations::{create_observation, review_observation};
pub use reports::list_reports;
pub use summary::get_participant_summary;
