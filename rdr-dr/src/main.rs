//! rdr-dr (Deceased Reports) - REST service and import batch runner
//!
//! Serves the deceased-report lifecycle API. With `--import-since`, runs a
//! single import sweep and exits (cron entry point).

use anyhow::Result;
use clap::Parser;
use rdr_common::api::auth::load_shared_secret;
use rdr_common::db::{init_database, settings};
use rdr_common::{config, time};
use rdr_dr::importer::{self, redcap::RedcapClient};
use rdr_dr::{build_router, AppState};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rdr-dr", about = "RDR Deceased Reports service")]
struct Args {
    /// Root data folder (overrides RDR_ROOT_FOLDER and the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Run one import sweep from this RFC 3339 timestamp and exit.
    /// Pass "default" for the start of the previous calendar day.
    #[arg(long)]
    import_since: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting RDR Deceased Reports (rdr-dr) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), "RDR_ROOT_FOLDER");
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    // One-shot import mode for the scheduler
    if let Some(since_arg) = args.import_since {
        let since = if since_arg == "default" {
            None
        } else {
            Some(time::parse_client_timestamp(&since_arg)?)
        };

        let api_url = settings::get_setting(&pool, settings::KEY_REDCAP_API_URL)
            .await?
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("redcap_api_url is not configured"))?;
        let api_token = settings::get_setting(&pool, settings::KEY_REDCAP_API_TOKEN)
            .await?
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow::anyhow!("redcap_api_token is not configured"))?;

        let client = RedcapClient::new(api_url, api_token);
        let outcome = importer::run_import(&pool, &client, since).await?;
        info!(
            "Import finished: {} fetched, {} created, {} skipped, {} failed",
            outcome.fetched, outcome.created, outcome.skipped, outcome.failed
        );
        return Ok(());
    }

    let shared_secret = match load_shared_secret(&pool).await {
        Ok(secret) => {
            if secret == 0 {
                info!("Operations auth disabled (shared_secret = 0)");
            } else {
                info!("✓ Loaded shared secret for operations endpoints");
            }
            secret
        }
        Err(e) => {
            error!("Failed to load shared secret: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool, shared_secret);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5780").await?;
    info!("rdr-dr listening on http://127.0.0.1:5780");
    info!("Health check: http://127.0.0.1:5780/health");

    axum::serve(listener, app).await?;

    Ok(())
}
