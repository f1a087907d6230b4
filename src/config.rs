use crate::error::{AppError, Result};

pub const RATES_FEED_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";
pub const METALS_FEED_URL: &str = "https://cbr.ru/hd_base/metall/metall_base_new/";

/// TTL for the in-memory (metal, date) spot price cache.
pub const SPOT_CACHE_TTL_SECS: u64 = 3600;

/// Issues from this year onward are matched against a grade whitelist instead
/// of exact grade equality — modern grading is finer than the market distinguishes.
pub const MODERN_YEAR_CUTOFF: i64 = 2020;

/// Exact-text comparable search is capped at this many most-recent sales.
pub const EXACT_TEXT_MATCH_LIMIT: i64 = 20;

/// Delay between lots in a batch run, to bound load on the store and the
/// price provider.
pub const BATCH_LOT_DELAY_MS: u64 = 50;

/// Batch progress is persisted every this many processed lots.
pub const BATCH_PROGRESS_EVERY: usize = 25;

/// Delay between upstream requests during historical price backfill.
pub const BACKFILL_REQUEST_DELAY_MS: u64 = 1000;

/// Confidence assigned when exactly one comparable is found.
pub const SINGLE_COMPARABLE_CONFIDENCE: f64 = 0.6;

/// Confidence ceiling for the statistical model.
pub const CONFIDENCE_CAP: f64 = 0.95;

/// Multiplier applied to confidence when the comparable-price coefficient of
/// variation exceeds `DISPERSION_CV_THRESHOLD`.
pub const DISPERSION_PENALTY: f64 = 0.8;
pub const DISPERSION_CV_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub rates_feed_url: String,
    pub metals_feed_url: String,
    /// HTTP timeout for upstream feed requests, seconds (FEED_TIMEOUT_SECS).
    pub feed_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "pricer.db".to_string()),
            rates_feed_url: std::env::var("RATES_FEED_URL")
                .unwrap_or_else(|_| RATES_FEED_URL.to_string()),
            metals_feed_url: std::env::var("METALS_FEED_URL")
                .unwrap_or_else(|_| METALS_FEED_URL.to_string()),
            feed_timeout_secs: std::env::var("FEED_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("FEED_TIMEOUT_SECS must be a number of seconds".to_string())
                })?,
        })
    }
}
