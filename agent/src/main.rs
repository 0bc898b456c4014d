//! quotesync agent - keeps a local quote file in sync with a quote server.

use quotesync_agent::{Config, HttpQuoteSource, JsonFileStorage, LogNotifier, SyncAgent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quotesync_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting quotesync agent against {} ({} payload)",
        config.server_url,
        config.payload
    );

    let source = HttpQuoteSource::from_config(&config)?;
    let storage = JsonFileStorage::new(&config.store_path);
    let agent = SyncAgent::load(source, storage, LogNotifier, config).await?;

    let handle = agent.spawn();

    // Initial sync on startup, then the timer takes over
    let report = handle.sync_now().await?;
    tracing::info!("Initial sync: {}", report.outcome.message());

    match handle.random_quote().await? {
        Some(quote) => tracing::info!("\"{}\" ({})", quote.text, quote.category),
        None => tracing::info!("No quotes available for this category."),
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let book = handle.shutdown().await?;
    tracing::info!("Stopped with {} quotes", book.len());

    Ok(())
}
