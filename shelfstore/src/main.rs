//! shelfstore - opens the configured library store, seeds it and reports its contents.

use anyhow::Context;

use shelfstore::{
    backend::AnyStore,
    config::AppConfig,
    seed::seed_library,
    store::LibraryStore,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    telemetry::init_tracing(&config.logging)?;

    tracing::info!("Starting shelfstore v{}", env!("CARGO_PKG_VERSION"));

    let store = AnyStore::open(&config.storage)
        .await
        .context("opening library store")?;

    let report = seed_library(&store, &config.seed)
        .await
        .context("seeding library store")?;

    tracing::info!(
        backend = ?store.kind(),
        books = store.get_books().await?.len(),
        active_loans = store.get_active_loans().await?.len(),
        users = store.count_users().await?,
        books_seeded = report.books_added,
        admin_created = report.admin_created,
        "library store ready"
    );

    store.shutdown().await?;

    Ok(())
}
