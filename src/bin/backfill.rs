//! Historical spot price backfill.
//!
//! Usage: backfill <from> [to]   (dates as YYYY-MM-DD, `to` defaults to today)

use chrono::{Local, NaiveDate};
use sqlx::sqlite::SqliteConnectOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lot_pricer::config::Config;
use lot_pricer::error::{AppError, Result};
use lot_pricer::spot::SpotPriceProvider;

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

fn parse_date(arg: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(arg, "%Y-%m-%d")
        .map_err(|_| AppError::Config(format!("invalid date '{arg}', expected YYYY-MM-DD")))
}

async fn run(cfg: Config) -> Result<()> {
    let mut args = std::env::args().skip(1);
    let from = match args.next() {
        Some(a) => parse_date(&a)?,
        None => {
            return Err(AppError::Config(
                "usage: backfill <from> [to] (YYYY-MM-DD)".to_string(),
            ))
        }
    };
    let to = match args.next() {
        Some(a) => parse_date(&a)?,
        None => Local::now().date_naive(),
    };
    if from > to {
        return Err(AppError::Config(format!("backfill range is empty: {from} > {to}")));
    }

    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let spot = SpotPriceProvider::new(pool, &cfg)?;
    info!(%from, %to, "starting spot price backfill");
    let (persisted, failed) = spot.backfill(from, to).await;
    info!(persisted, failed, "backfill finished");

    Ok(())
}
