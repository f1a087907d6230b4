//! Robust aggregation of comparable sales into a prediction, and the
//! pipeline wiring around it.
//!
//! The aggregation itself is pure and synchronous; everything async (store,
//! spot prices) happens before it is called.

use tracing::debug;

use crate::config::{
    CONFIDENCE_CAP, DISPERSION_CV_THRESHOLD, DISPERSION_PENALTY, SINGLE_COMPARABLE_CONFIDENCE,
};
use crate::db::LotStore;
use crate::error::Result;
use crate::matcher;
use crate::policy;
use crate::spot::SpotPriceProvider;
use crate::types::{Lot, PredictionMethod, PredictionResult};

/// A comparable reduced to the two numbers aggregation needs: its realized
/// price and its bullion value as of its own sale date.
#[derive(Debug, Clone, Copy)]
pub struct Comparable {
    pub price: f64,
    pub metal_value: f64,
}

/// Metal-value correction: shift a comparable-derived price by the bullion
/// value gap between target and comparable. Applied only when both sides
/// carry a real bullion value; a zero on either side means the gap is
/// meaningless, not zero.
fn corrected(base: f64, target_metal_value: f64, comp_metal_value: f64) -> f64 {
    if target_metal_value <= 0.0 || comp_metal_value <= 0.0 {
        return base;
    }
    let shifted = base + (target_metal_value - comp_metal_value);
    if shifted.is_finite() {
        shifted
    } else {
        base
    }
}

/// Upper-middle element of the sorted prices. For odd samples this is the
/// true median; for even samples the convention favors the higher middle.
fn median(sorted: &[f64]) -> f64 {
    sorted[sorted.len() / 2]
}

/// Population coefficient of variation of the raw (uncorrected) prices.
fn coefficient_of_variation(prices: &[f64]) -> f64 {
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// Fold comparables into a prediction. `target_metal_value` is the target
/// lot's bullion value as of today.
pub fn aggregate(target_metal_value: f64, comps: &[Comparable]) -> PredictionResult {
    match comps {
        [] => PredictionResult {
            predicted_price: None,
            metal_value: target_metal_value,
            numismatic_premium: None,
            confidence: 0.0,
            method: PredictionMethod::NoSimilarLots,
            sample_size: 0,
        },
        [only] => {
            let predicted = corrected(only.price, target_metal_value, only.metal_value);
            PredictionResult {
                predicted_price: Some(predicted),
                metal_value: target_metal_value,
                numismatic_premium: Some(predicted - target_metal_value),
                confidence: SINGLE_COMPARABLE_CONFIDENCE,
                method: PredictionMethod::SingleSimilarLot,
                sample_size: 1,
            }
        }
        _ => {
            let mut prices: Vec<f64> = comps.iter().map(|c| c.price).collect();
            prices.sort_by(|a, b| a.total_cmp(b));
            let base = median(&prices);

            let n = comps.len() as f64;
            let mean_comp_metal = comps.iter().map(|c| c.metal_value).sum::<f64>() / n;
            let predicted = corrected(base, target_metal_value, mean_comp_metal);

            let mut confidence = (0.5 + n / 20.0).min(CONFIDENCE_CAP);
            let cv = coefficient_of_variation(&prices);
            if cv > DISPERSION_CV_THRESHOLD {
                debug!(cv, "dispersed comparable sample, penalizing confidence");
                confidence *= DISPERSION_PENALTY;
            }
            let confidence = confidence.clamp(0.0, CONFIDENCE_CAP);

            PredictionResult {
                predicted_price: Some(predicted),
                metal_value: target_metal_value,
                numismatic_premium: Some(predicted - target_metal_value),
                confidence,
                method: PredictionMethod::StatisticalModel,
                sample_size: comps.len(),
            }
        }
    }
}

/// The full per-lot pipeline: category gate, comparable matching, bullion
/// valuation, aggregation.
pub struct Valuator {
    store: LotStore,
    spot: SpotPriceProvider,
}

impl Valuator {
    pub fn new(store: LotStore, spot: SpotPriceProvider) -> Self {
        Self { store, spot }
    }

    pub fn store(&self) -> &LotStore {
        &self.store
    }

    /// Value one lot. Excluded categories short-circuit to a metal-value-only
    /// result without touching the comparable tables.
    pub async fn predict(&self, lot: &Lot) -> Result<PredictionResult> {
        let metal_value = self.spot.metal_value(lot.metal, lot.weight, None).await;

        if !policy::is_predictable(lot.category) {
            return Ok(PredictionResult {
                predicted_price: None,
                metal_value,
                numismatic_premium: None,
                confidence: 0.0,
                method: PredictionMethod::CategoryExcluded,
                sample_size: 0,
            });
        }

        let comparables = matcher::find_comparables(&self.store, lot).await?;
        let mut comps = Vec::with_capacity(comparables.len());
        for c in &comparables {
            // Each comparable is valued at its own sale date so the bullion
            // gap reflects market moves between then and now.
            let comp_metal_value = self.spot.metal_value(c.metal, c.weight, c.sale_date).await;
            comps.push(Comparable { price: c.price, metal_value: comp_metal_value });
        }

        debug!(
            lot_id = lot.id,
            comparables = comps.len(),
            metal_value,
            "aggregating comparables"
        );
        Ok(aggregate(metal_value, &comps))
    }

    /// Value a lot by id and persist the result.
    pub async fn predict_and_store(&self, lot_id: i64) -> Result<PredictionResult> {
        let lot = self.store.get_lot(lot_id).await?;
        let result = self.predict(&lot).await?;
        self.store.upsert_prediction(lot.id, &result).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(price: f64, metal_value: f64) -> Comparable {
        Comparable { price, metal_value }
    }

    #[test]
    fn empty_sample_yields_no_prediction() {
        let r = aggregate(96_000.0, &[]);
        assert_eq!(r.predicted_price, None);
        assert_eq!(r.numismatic_premium, None);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.method, PredictionMethod::NoSimilarLots);
        assert_eq!(r.metal_value, 96_000.0);
    }

    #[test]
    fn single_comparable_applies_metal_gap() {
        let r = aggregate(96_000.0, &[comp(200_000.0, 90_000.0)]);
        assert_eq!(r.predicted_price, Some(206_000.0));
        assert_eq!(r.numismatic_premium, Some(110_000.0));
        assert_eq!(r.confidence, SINGLE_COMPARABLE_CONFIDENCE);
        assert_eq!(r.method, PredictionMethod::SingleSimilarLot);
        assert_eq!(r.sample_size, 1);
    }

    #[test]
    fn single_comparable_without_bullion_skips_correction() {
        // Target has no recorded weight: the gap is unknowable, not zero.
        let r = aggregate(0.0, &[comp(200_000.0, 90_000.0)]);
        assert_eq!(r.predicted_price, Some(200_000.0));
        let r = aggregate(96_000.0, &[comp(200_000.0, 0.0)]);
        assert_eq!(r.predicted_price, Some(200_000.0));
    }

    #[test]
    fn three_comparables_use_median_plus_mean_gap() {
        // median of (200k, 210k, 260k) = 210k; mean comp metal 92k;
        // target metal 96k ⇒ offset +4k.
        let comps = [
            comp(200_000.0, 90_000.0),
            comp(210_000.0, 91_000.0),
            comp(260_000.0, 95_000.0),
        ];
        let r = aggregate(96_000.0, &comps);
        assert_eq!(r.predicted_price, Some(214_000.0));
        assert_eq!(r.numismatic_premium, Some(118_000.0));
        assert!((r.confidence - 0.65).abs() < 1e-9);
        assert_eq!(r.method, PredictionMethod::StatisticalModel);
        assert_eq!(r.sample_size, 3);
    }

    #[test]
    fn even_sample_median_takes_upper_middle() {
        let comps = [
            comp(100.0, 0.0),
            comp(200.0, 0.0),
            comp(300.0, 0.0),
            comp(400.0, 0.0),
        ];
        let r = aggregate(0.0, &comps);
        assert_eq!(r.predicted_price, Some(300.0));
    }

    #[test]
    fn confidence_grows_with_sample_and_caps() {
        let sample = |n: usize| {
            let comps: Vec<Comparable> = (0..n).map(|_| comp(1000.0, 0.0)).collect();
            aggregate(0.0, &comps).confidence
        };
        assert!(sample(2) < sample(5));
        assert!(sample(5) < sample(8));
        // 0.5 + 9/20 = 0.95, and growth stops at the cap
        assert_eq!(sample(9), CONFIDENCE_CAP);
        assert_eq!(sample(50), CONFIDENCE_CAP);
    }

    #[test]
    fn dispersed_prices_are_penalized() {
        // identical prices: CV = 0, no penalty
        let tight = aggregate(0.0, &[comp(1000.0, 0.0), comp(1000.0, 0.0)]);
        assert!((tight.confidence - 0.6).abs() < 1e-9);

        // 100 vs 10_000: CV well above the threshold
        let wide = aggregate(0.0, &[comp(100.0, 0.0), comp(10_000.0, 0.0)]);
        assert!((wide.confidence - 0.6 * DISPERSION_PENALTY).abs() < 1e-9);
    }

    #[test]
    fn premium_is_prediction_minus_metal_value() {
        let r = aggregate(50_000.0, &[comp(120_000.0, 50_000.0), comp(130_000.0, 50_000.0)]);
        let predicted = r.predicted_price.unwrap();
        assert_eq!(r.numismatic_premium, Some(predicted - 50_000.0));
    }

    #[tokio::test]
    async fn platinum_lot_without_weight_or_comparables() {
        use crate::config::Config;
        use crate::types::{Category, Lot, Metal};

        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let cfg = Config {
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            rates_feed_url: "http://127.0.0.1:9/rates".to_string(),
            metals_feed_url: "http://127.0.0.1:9/metals".to_string(),
            feed_timeout_secs: 1,
        };
        let spot = crate::spot::SpotPriceProvider::new(pool.clone(), &cfg).unwrap();
        let valuator = Valuator::new(LotStore::new(pool), spot);

        let lot = Lot {
            id: 1,
            category: Category::Coin,
            metal: Some(Metal::Pt),
            weight: None,
            grade: None,
            year: Some(1830),
            description: "3 рубля 1830г. СПБ. Pt".to_string(),
            sold_price: None,
            sale_id: "964".to_string(),
            sale_date: None,
        };
        let r = valuator.predict(&lot).await.unwrap();
        assert_eq!(r.predicted_price, None);
        assert_eq!(r.metal_value, 0.0);
        assert_eq!(r.method, PredictionMethod::NoSimilarLots);
        assert_eq!(r.confidence, 0.0);
    }
}
