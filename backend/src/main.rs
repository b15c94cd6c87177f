//! Coffee Ledger - Backend Server
//!
//! Serves accounting and per-process profit reports over a coffee trading
//! ledger kept in memory, in PostgreSQL or in a published spreadsheet.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use coffee_ledger::{
    config::{LedgerSource, LogFormat},
    create_app,
    external::SheetsClient,
    store::{LedgerStore, MemoryLedgerStore, PgLedgerStore, SheetLedgerStore},
    AppState, Config,
};
use shared::Collection;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "ledger_server=debug,coffee_ledger=debug,tower_http=debug,sqlx=warn".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Coffee Ledger Server");
    tracing::info!("Environment: {}", config.environment);

    let store = build_store(&config).await?;
    tracing::info!("Ledger source: {}", store.name());

    // Create application state
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid server.host {:?}", config.server.host))?;
    let addr = SocketAddr::from((ip, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.ledger.source {
        LedgerSource::Memory => {
            let store = match &config.ledger.seed_file {
                Some(path) => MemoryLedgerStore::from_json_file(path)?,
                None => {
                    tracing::warn!("No seed file configured; starting with an empty ledger");
                    MemoryLedgerStore::default()
                }
            };
            Ok(Arc::new(store))
        }
        LedgerSource::Postgres => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }
            Ok(Arc::new(PgLedgerStore::new(db_pool)))
        }
        LedgerSource::Sheets => {
            let client = SheetsClient::with_base_url(
                config.sheets.spreadsheet_id.clone(),
                config.sheets.base_url.clone(),
                Duration::from_secs(config.sheets.request_timeout_secs),
            )?;
            let store = Collection::ALL.iter().fold(
                SheetLedgerStore::new(Arc::new(client)),
                |store, collection| {
                    store.with_tab(*collection, config.sheets.tabs.name_for(*collection))
                },
            );
            Ok(Arc::new(store))
        }
    }
}
