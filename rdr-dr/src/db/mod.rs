//! Database access for the Deceased Reports service
//!
//! Functions take `&mut SqliteConnection` where they participate in the
//! lifecycle engine's transactions, and `&SqlitePool` for standalone reads.

pub mod api_users;
pub mod participants;
pub mod reports;
pub mod summary;
