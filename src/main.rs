use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cpi_tracker_service::config::Config;
use cpi_tracker_service::db::SeriesRepository;
use cpi_tracker_service::discovery::LinkDiscoverer;
use cpi_tracker_service::importers::CpiTableImporter;
use cpi_tracker_service::updater;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cpi_tracker_service=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    info!("Starting CPI tracker with config: {:?}", config);

    // One HTTP client for the whole pipeline (keep-alive across requests)
    let client = config.http_client()?;

    info!("Connecting to database...");
    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    let repo = SeriesRepository::new(pool);
    repo.ensure_schema().await?;
    info!("Database connection established");

    let discoverer = LinkDiscoverer::with_client(client.clone(), config.base_url.clone());
    let links = discoverer.discover().await?;
    info!("Web scraping found {} table links: {:?}", links.len(), links);

    let importer = CpiTableImporter::with_client(client, config.restatement_policy);
    let total = updater::update_all(&importer, &repo, &links).await?;
    info!("CPI data has been updated: {} points stored", total);

    Ok(())
}
