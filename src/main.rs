use chrono::Local;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lot_pricer::batch;
use lot_pricer::config::Config;
use lot_pricer::db::LotStore;
use lot_pricer::error::{AppError, Result};
use lot_pricer::spot::SpotPriceProvider;
use lot_pricer::valuation::Valuator;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Spot price refresh (best effort) ---
    let spot = SpotPriceProvider::new(pool.clone(), &cfg)?;
    let today = Local::now().date_naive();
    match spot.fetch_and_persist(today).await {
        Ok(true) => info!(%today, "spot prices refreshed"),
        Ok(false) => warn!(%today, "spot feeds unavailable, valuing from stored prices"),
        Err(e) => warn!(%today, "spot price persistence failed: {e}"),
    }

    // --- Select the sale to value ---
    let store = LotStore::new(pool);
    let sale_id = match std::env::args().nth(1) {
        Some(id) => id,
        None => store
            .latest_sale_id()
            .await?
            .ok_or_else(|| AppError::Config("no sales in database and no sale id given".to_string()))?,
    };

    // --- Batch valuation ---
    let valuator = Valuator::new(store, spot);
    let summary = batch::run_sale(&valuator, &sale_id).await?;
    info!(
        %sale_id,
        processed = summary.processed,
        failed = summary.failed,
        "done"
    );

    Ok(())
}
