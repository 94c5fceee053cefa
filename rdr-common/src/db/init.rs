//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently
//! (CREATE TABLE IF NOT EXISTS per table). Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_settings_table(&pool).await?;
    create_organizations_table(&pool).await?;
    create_participants_table(&pool).await?;
    create_api_users_table(&pool).await?;
    create_deceased_reports_table(&pool).await?;
    create_participant_summary_table(&pool).await?;

    // Initialize default settings
    init_default_settings(&pool).await?;

    Ok(pool)
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            external_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    // organization_external_id NULL = unpaired participant
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            participant_id INTEGER PRIMARY KEY,
            organization_external_id TEXT
                REFERENCES organizations(external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_api_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            system TEXT NOT NULL,
            username TEXT NOT NULL,
            UNIQUE (system, username)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_deceased_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deceased_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_id INTEGER NOT NULL REFERENCES participants(participant_id),
            status TEXT NOT NULL,
            notification TEXT NOT NULL,
            notification_other TEXT,
            reporter_name TEXT,
            reporter_relationship TEXT,
            reporter_email TEXT,
            reporter_phone TEXT,
            author_id INTEGER NOT NULL REFERENCES api_users(id),
            authored TEXT NOT NULL,
            reviewer_id INTEGER REFERENCES api_users(id),
            reviewed TEXT,
            date_of_death TEXT,
            cause_of_death TEXT,
            denial_reason TEXT,
            denial_reason_other TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Concurrency backstop for the single-active-report rule: the engine
    // performs a read-then-insert check inside the transaction, and this
    // partial unique index rejects a racing duplicate at the database level.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_deceased_reports_active
        ON deceased_reports (participant_id)
        WHERE status IN ('PENDING', 'APPROVED')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_deceased_reports_authored
        ON deceased_reports (authored)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_participant_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participant_summary (
            participant_id INTEGER PRIMARY KEY
                REFERENCES participants(participant_id),
            deceased_status TEXT NOT NULL DEFAULT 'UNSET',
            deceased_authored TEXT,
            date_of_death TEXT,
            phone TEXT,
            email TEXT,
            address TEXT,
            recontact_method TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Initialize default settings (INSERT OR IGNORE - existing values win)
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults: &[(&str, &str)] = &[
        (crate::db::settings::KEY_GRACE_PERIOD_DAYS, "30"),
        (crate::db::settings::KEY_REDCAP_API_URL, ""),
        (crate::db::settings::KEY_REDCAP_API_TOKEN, ""),
        (
            crate::db::settings::KEY_SUPPORT_DESK_EMAIL,
            "support@rdr-platform.org",
        ),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}
