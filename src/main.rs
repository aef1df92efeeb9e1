mod aggregator;
mod config;
mod models;
mod scrapers;
mod server;
mod storage;

use std::sync::Arc;

use clap::Parser;
use config::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🏠 Property Scout - SquareYards, NoBroker, Housing.com");
    info!("==========================================");
    info!("Page size: {} records per source", settings.page_size);
    if settings.google_api_key.is_none() {
        info!("⚠️  GOOGLE_API_KEY not set, NoBroker searches will return no listings");
    }
    if let Some(dir) = &settings.output_dir {
        info!("💾 Saving responses to {}", dir.display());
    }

    server::serve(Arc::new(settings)).await
}
