//! Shared API helpers

pub mod auth;
