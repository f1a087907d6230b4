//! Sequential batch valuation of one sale with checkpointed resume.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{BATCH_LOT_DELAY_MS, BATCH_PROGRESS_EVERY};
use crate::error::Result;
use crate::valuation::Valuator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Value every lot of a sale in id order, persisting each prediction as it
/// is computed. A per-lot failure is counted and logged, never fatal to the
/// run; only store errors on the batch's own bookkeeping abort it.
///
/// Progress is checkpointed so an interrupted run resumes after the last
/// checkpointed lot instead of recomputing the whole sale.
pub async fn run_sale(valuator: &Valuator, sale_id: &str) -> Result<BatchSummary> {
    let store = valuator.store();

    let (after_id, mut processed) = match store.progress(sale_id).await? {
        Some(p) => {
            info!(sale_id, last_lot_id = p.last_lot_id, processed = p.processed, "resuming batch");
            (p.last_lot_id, p.processed as usize)
        }
        None => (0, 0),
    };

    let lots = store.lots_in_sale(sale_id, after_id).await?;
    if lots.is_empty() && processed == 0 {
        warn!(sale_id, "no lots found for sale");
        return Ok(BatchSummary::default());
    }
    info!(sale_id, remaining = lots.len(), "starting batch valuation");

    let mut failed = 0usize;
    let mut since_checkpoint = 0usize;

    for lot in &lots {
        match valuator.predict_and_store(lot.id).await {
            Ok(result) => {
                processed += 1;
                info!(
                    lot_id = lot.id,
                    method = %result.method,
                    predicted = ?result.predicted_price,
                    confidence = result.confidence,
                    "lot valued"
                );
            }
            Err(e) => {
                failed += 1;
                error!(lot_id = lot.id, "valuation failed: {e}");
            }
        }

        since_checkpoint += 1;
        if since_checkpoint >= BATCH_PROGRESS_EVERY {
            store.save_progress(sale_id, lot.id, processed as i64).await?;
            since_checkpoint = 0;
        }

        tokio::time::sleep(Duration::from_millis(BATCH_LOT_DELAY_MS)).await;
    }

    // A finished sale leaves no checkpoint behind; the next run starts clean.
    store.clear_progress(sale_id).await?;

    info!(sale_id, processed, failed, "batch complete");
    Ok(BatchSummary { processed, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::store::insert_test_lot;
    use crate::db::LotStore;
    use crate::spot::SpotPriceProvider;

    async fn test_valuator() -> Valuator {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let cfg = Config {
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            rates_feed_url: "http://127.0.0.1:9/rates".to_string(),
            metals_feed_url: "http://127.0.0.1:9/metals".to_string(),
            feed_timeout_secs: 1,
        };
        let spot = SpotPriceProvider::new(pool.clone(), &cfg).unwrap();
        Valuator::new(LotStore::new(pool), spot)
    }

    #[tokio::test]
    async fn values_every_lot_and_clears_checkpoint() {
        let valuator = test_valuator().await;
        let store = valuator.store();
        insert_test_lot(store.pool(), 1, "964", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", None, None).await;
        insert_test_lot(store.pool(), 2, "964", "jewelry", Some("Au"), Some(8.0), None, None, "Кольцо золотое", None, None).await;

        let summary = run_sale(&valuator, "964").await.unwrap();
        assert_eq!(summary, BatchSummary { processed: 2, failed: 0 });

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lot_predictions")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(store.progress("964").await.unwrap().is_none());

        let row = store.prediction(2).await.unwrap().unwrap();
        assert_eq!(row.prediction_method, "category_excluded");
        assert_eq!(row.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn resumes_after_checkpointed_lot() {
        let valuator = test_valuator().await;
        let store = valuator.store();
        insert_test_lot(store.pool(), 1, "964", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", None, None).await;
        insert_test_lot(store.pool(), 2, "964", "coin", Some("Ag"), Some(20.0), Some("XF"), Some(1913), "1 рубль 1913", None, None).await;

        // pretend a previous run checkpointed after lot 1
        store.save_progress("964", 1, 1).await.unwrap();

        let summary = run_sale(&valuator, "964").await.unwrap();
        assert_eq!(summary, BatchSummary { processed: 2, failed: 0 });

        // only lot 2 was valued in this run
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lot_predictions")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn empty_sale_is_a_noop() {
        let valuator = test_valuator().await;
        let summary = run_sale(&valuator, "999").await.unwrap();
        assert_eq!(summary, BatchSummary::default());
    }
}
