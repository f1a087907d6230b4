use std::time::{Duration, Instant};

use chrono::{Datelike, Local, NaiveDate, Weekday};
use tracing::{debug, info, warn};

use crate::config::{Config, BACKFILL_REQUEST_DELAY_MS, SPOT_CACHE_TTL_SECS};
use crate::error::Result;
use crate::spot::cache::TtlCache;
use crate::spot::feed::{parse_exchange_rate, parse_metal_prices, MetalPrices};
use crate::types::Metal;

/// Last-resort per-gram prices used when no table row can be found for any
/// probed date. Calibrated against recent market levels; keeps the engine
/// from hard-failing on a cold price table.
const DEFAULT_PRICE_PER_GRAM: &[(Metal, f64)] = &[
    (Metal::Au, 7500.0),
    (Metal::Ag, 100.0),
    (Metal::Pt, 3000.0),
    (Metal::Pd, 2000.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotQuote {
    pub price_per_gram: f64,
    pub exchange_rate: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct MetalPriceRow {
    usd_rate: Option<f64>,
    gold_price: Option<f64>,
    silver_price: Option<f64>,
    platinum_price: Option<f64>,
    palladium_price: Option<f64>,
}

impl MetalPriceRow {
    fn price_for(&self, metal: Metal) -> Option<f64> {
        match metal {
            Metal::Au => self.gold_price,
            Metal::Ag => self.silver_price,
            Metal::Pt => self.platinum_price,
            Metal::Pd => self.palladium_price,
            _ => None,
        }
    }
}

/// Daily metal spot prices: persisted table + in-memory TTL cache + two
/// upstream feeds. All lookup paths degrade to `None`; only persistence
/// surfaces database errors.
pub struct SpotPriceProvider {
    pool: sqlx::SqlitePool,
    client: reqwest::Client,
    cache: TtlCache<(Metal, NaiveDate), SpotQuote>,
    rates_feed_url: String,
    metals_feed_url: String,
}

impl SpotPriceProvider {
    pub fn new(pool: sqlx::SqlitePool, cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.feed_timeout_secs))
            .build()?;
        Ok(Self {
            pool,
            client,
            cache: TtlCache::new(Duration::from_secs(SPOT_CACHE_TTL_SECS)),
            rates_feed_url: cfg.rates_feed_url.clone(),
            metals_feed_url: cfg.metals_feed_url.clone(),
        })
    }

    /// Exact-date lookup. Cache first, then the persisted table. Returns None
    /// for base metals, missing dates, and database failures alike.
    pub async fn price_on_date(&self, date: NaiveDate, metal: Metal) -> Option<SpotQuote> {
        if !metal.is_precious() {
            return None;
        }
        let now = Instant::now();
        if let Some(quote) = self.cache.get(&(metal, date), now) {
            return Some(quote);
        }

        let row: Option<MetalPriceRow> = match sqlx::query_as(
            r#"
            SELECT usd_rate, gold_price, silver_price, platinum_price, palladium_price
            FROM metal_prices
            WHERE date = ?
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(%date, %metal, "spot price lookup failed: {e}");
                return None;
            }
        };

        let row = row?;
        let price_per_gram = row.price_for(metal)?;
        let quote = SpotQuote { price_per_gram, exchange_rate: row.usd_rate };
        self.cache.insert((metal, date), quote, now);
        Some(quote)
    }

    /// Probe a short fixed list of dates in order — never an unbounded search.
    pub async fn price_with_fallback(
        &self,
        metal: Metal,
        dates: &[NaiveDate],
    ) -> Option<SpotQuote> {
        for &date in dates {
            if let Some(quote) = self.price_on_date(date, metal).await {
                return Some(quote);
            }
        }
        None
    }

    /// Intrinsic bullion value of `weight` grams of `metal` on `on` (or
    /// today/yesterday when unspecified). Missing weight, base metal, or a
    /// completely cold price table degrade through the static default table,
    /// then to 0 — never an error.
    pub async fn metal_value(
        &self,
        metal: Option<Metal>,
        weight: Option<f64>,
        on: Option<NaiveDate>,
    ) -> f64 {
        let Some(metal) = metal else { return 0.0 };
        let Some(weight) = weight else { return 0.0 };
        if !(weight > 0.0) || !metal.is_precious() {
            return 0.0;
        }

        let probe: Vec<NaiveDate> = match on {
            Some(date) => vec![date],
            None => {
                let today = Local::now().date_naive();
                vec![today, today - chrono::Days::new(1)]
            }
        };

        let price_per_gram = match self.price_with_fallback(metal, &probe).await {
            Some(quote) => quote.price_per_gram,
            None => match fallback_price(metal) {
                Some(p) => {
                    debug!(%metal, "no table price for probed dates, using static default");
                    p
                }
                None => return 0.0,
            },
        };

        let value = weight * metal.purity() * price_per_gram;
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Pull both feeds for one date and upsert a single row. Network and
    /// parse failures degrade to `Ok(false)` (nothing persisted); only the
    /// database write can return an error.
    pub async fn fetch_and_persist(&self, date: NaiveDate) -> Result<bool> {
        let rate = self.fetch_exchange_rate(date).await;
        let metals = self.fetch_metal_prices(date).await.unwrap_or_default();

        if rate.is_none() && metals.is_empty() {
            warn!(%date, "both upstream feeds degraded, nothing to persist");
            return Ok(false);
        }

        let updated_at = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO metal_prices (date, usd_rate, gold_price, silver_price, platinum_price, palladium_price, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                usd_rate = excluded.usd_rate,
                gold_price = excluded.gold_price,
                silver_price = excluded.silver_price,
                platinum_price = excluded.platinum_price,
                palladium_price = excluded.palladium_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(date)
        .bind(rate)
        .bind(metals.gold)
        .bind(metals.silver)
        .bind(metals.platinum)
        .bind(metals.palladium)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        info!(
            %date,
            usd = ?rate,
            gold = ?metals.gold,
            silver = ?metals.silver,
            "spot prices persisted"
        );
        Ok(true)
    }

    /// Historical backfill over an inclusive date range. Weekends are
    /// skipped (the feeds publish no data), each date is independent, and a
    /// fixed sleep paces the upstream requests.
    pub async fn backfill(&self, from: NaiveDate, to: NaiveDate) -> (usize, usize) {
        let mut persisted = 0usize;
        let mut failed = 0usize;
        let mut date = from;

        while date <= to {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                date = date + chrono::Days::new(1);
                continue;
            }
            match self.fetch_and_persist(date).await {
                Ok(true) => persisted += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    failed += 1;
                    warn!(%date, "backfill write failed: {e}");
                }
            }
            tokio::time::sleep(Duration::from_millis(BACKFILL_REQUEST_DELAY_MS)).await;
            date = date + chrono::Days::new(1);
        }

        info!(persisted, failed, "backfill complete: {from} → {to}");
        (persisted, failed)
    }

    async fn fetch_exchange_rate(&self, date: NaiveDate) -> Option<f64> {
        let url = format!("{}?date_req={}", self.rates_feed_url, date.format("%d.%m.%Y"));
        let body = match self.client.get(&url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(%date, "rates feed body error: {e}");
                    return None;
                }
            },
            Err(e) => {
                warn!(%date, "rates feed unreachable: {e}");
                return None;
            }
        };
        parse_exchange_rate(&body)
    }

    async fn fetch_metal_prices(&self, date: NaiveDate) -> Option<MetalPrices> {
        let d = date.format("%d.%m.%Y");
        let url = format!(
            "{}?UniDbQuery.From={d}&UniDbQuery.To={d}&UniDbQuery.Gold=true&UniDbQuery.Silver=true&UniDbQuery.Platinum=true&UniDbQuery.Palladium=true&UniDbQuery.Posted=True&UniDbQuery.so=1",
            self.metals_feed_url
        );
        let body = match self.client.get(&url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(%date, "metals feed body error: {e}");
                    return None;
                }
            },
            Err(e) => {
                warn!(%date, "metals feed unreachable: {e}");
                return None;
            }
        };
        parse_metal_prices(&body)
    }
}

fn fallback_price(metal: Metal) -> Option<f64> {
    DEFAULT_PRICE_PER_GRAM
        .iter()
        .find(|(m, _)| *m == metal)
        .map(|(_, p)| *p)
}
