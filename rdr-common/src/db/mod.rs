//! Database initialization, schema, and shared helpers

pub mod init;
pub mod models;
pub mod settings;

pub use init::init_database;
