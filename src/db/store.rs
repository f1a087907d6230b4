use crate::db::models::{CandidateRow, LotRow, PredictionRow, ProgressRow};
use crate::error::{AppError, Result};
use crate::types::{Lot, Metal, PredictionResult};

/// Read side of the historical lot table plus the prediction/progress write
/// side. All writes are idempotent upserts.
#[derive(Clone)]
pub struct LotStore {
    pool: sqlx::SqlitePool,
}

impl LotStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub async fn get_lot(&self, id: i64) -> Result<Lot> {
        let row: Option<LotRow> = sqlx::query_as(
            r#"
            SELECT id, sale_id, category, metal, weight, grade, year, description, sold_price, sale_date
            FROM lots
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LotRow::into_lot).ok_or(AppError::LotNotFound(id))
    }

    /// Lots of one sale with id greater than `after_id`, ascending — the
    /// batch runner's resume ordering.
    pub async fn lots_in_sale(&self, sale_id: &str, after_id: i64) -> Result<Vec<Lot>> {
        let rows: Vec<LotRow> = sqlx::query_as(
            r#"
            SELECT id, sale_id, category, metal, weight, grade, year, description, sold_price, sale_date
            FROM lots
            WHERE sale_id = ? AND id > ?
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .bind(after_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LotRow::into_lot).collect())
    }

    /// Most recently started sale, by maximum lot id.
    pub async fn latest_sale_id(&self) -> Result<Option<String>> {
        let sale_id: Option<String> =
            sqlx::query_scalar("SELECT sale_id FROM lots ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(sale_id)
    }

    /// Sold candidates sharing metal and year with the target, excluding the
    /// target itself and its whole sale batch, most recent first. Grade and
    /// description narrowing happen in the matcher.
    pub async fn structured_candidates(
        &self,
        metal: Metal,
        year: i64,
        exclude_id: i64,
        exclude_sale_id: &str,
    ) -> Result<Vec<CandidateRow>> {
        let rows: Vec<CandidateRow> = sqlx::query_as(
            r#"
            SELECT id, sale_id, sold_price, metal, weight, grade, description, sale_date
            FROM lots
            WHERE metal = ?
              AND year = ?
              AND sold_price IS NOT NULL
              AND sold_price > 0
              AND id != ?
              AND sale_id != ?
            ORDER BY sale_date DESC
            "#,
        )
        .bind(metal.to_string())
        .bind(year)
        .bind(exclude_id)
        .bind(exclude_sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// All sold candidates outside the target's sale batch, most recent
    /// first. The matcher applies normalized description equality on top.
    pub async fn sold_candidates(
        &self,
        exclude_id: i64,
        exclude_sale_id: &str,
    ) -> Result<Vec<CandidateRow>> {
        let rows: Vec<CandidateRow> = sqlx::query_as(
            r#"
            SELECT id, sale_id, sold_price, metal, weight, grade, description, sale_date
            FROM lots
            WHERE sold_price IS NOT NULL
              AND sold_price > 0
              AND id != ?
              AND sale_id != ?
            ORDER BY sale_date DESC
            "#,
        )
        .bind(exclude_id)
        .bind(exclude_sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Upsert a prediction keyed by lot id. Recomputation fully overwrites.
    pub async fn upsert_prediction(&self, lot_id: i64, result: &PredictionResult) -> Result<()> {
        let method = result.method.to_string();
        let sample_size = result.sample_size as i64;
        let computed_at = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO lot_predictions (
                lot_id, predicted_price, metal_value, numismatic_premium,
                confidence_score, prediction_method, sample_size, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(lot_id) DO UPDATE SET
                predicted_price = excluded.predicted_price,
                metal_value = excluded.metal_value,
                numismatic_premium = excluded.numismatic_premium,
                confidence_score = excluded.confidence_score,
                prediction_method = excluded.prediction_method,
                sample_size = excluded.sample_size,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(lot_id)
        .bind(result.predicted_price)
        .bind(result.metal_value)
        .bind(result.numismatic_premium)
        .bind(result.confidence)
        .bind(method)
        .bind(sample_size)
        .bind(computed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn prediction(&self, lot_id: i64) -> Result<Option<PredictionRow>> {
        let row: Option<PredictionRow> = sqlx::query_as(
            r#"
            SELECT lot_id, predicted_price, metal_value, numismatic_premium,
                   confidence_score, prediction_method, sample_size, computed_at
            FROM lot_predictions
            WHERE lot_id = ?
            "#,
        )
        .bind(lot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn progress(&self, sale_id: &str) -> Result<Option<ProgressRow>> {
        let row: Option<ProgressRow> = sqlx::query_as(
            "SELECT sale_id, last_lot_id, processed, updated_at FROM prediction_progress WHERE sale_id = ?",
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn save_progress(&self, sale_id: &str, last_lot_id: i64, processed: i64) -> Result<()> {
        let updated_at = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO prediction_progress (sale_id, last_lot_id, processed, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(sale_id) DO UPDATE SET
                last_lot_id = excluded.last_lot_id,
                processed = excluded.processed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(sale_id)
        .bind(last_lot_id)
        .bind(processed)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_progress(&self, sale_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM prediction_progress WHERE sale_id = ?")
            .bind(sale_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Test fixture helper — inserts one lot row.
#[cfg(test)]
pub async fn insert_test_lot(
    pool: &sqlx::SqlitePool,
    id: i64,
    sale_id: &str,
    category: &str,
    metal: Option<&str>,
    weight: Option<f64>,
    grade: Option<&str>,
    year: Option<i64>,
    description: &str,
    sold_price: Option<f64>,
    sale_date: Option<chrono::NaiveDate>,
) {
    sqlx::query(
        r#"
        INSERT INTO lots (id, sale_id, category, metal, weight, grade, year, description, sold_price, sale_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(sale_id)
    .bind(category)
    .bind(metal)
    .bind(weight)
    .bind(grade)
    .bind(year)
    .bind(description)
    .bind(sold_price)
    .bind(sale_date)
    .execute(pool)
    .await
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PredictionMethod;
    use chrono::NaiveDate;

    async fn test_store() -> LotStore {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        LotStore::new(pool)
    }

    #[tokio::test]
    async fn get_lot_maps_domain_types() {
        let store = test_store().await;
        insert_test_lot(
            store.pool(),
            1,
            "964",
            "coin",
            Some("Au"),
            Some(12.9),
            Some("MS63"),
            Some(1897),
            "15 рублей 1897г. АГ. Au",
            None,
            None,
        )
        .await;

        let lot = store.get_lot(1).await.unwrap();
        assert_eq!(lot.metal, Some(Metal::Au));
        assert_eq!(lot.year, Some(1897));
        assert_eq!(lot.sale_id, "964");
        assert!(lot.sold_price.is_none());
    }

    #[tokio::test]
    async fn missing_lot_is_an_error() {
        let store = test_store().await;
        assert!(matches!(store.get_lot(99).await, Err(AppError::LotNotFound(99))));
    }

    #[tokio::test]
    async fn structured_candidates_exclude_target_and_batch() {
        let store = test_store().await;
        let d = NaiveDate::from_ymd_opt(2024, 5, 1);
        // target
        insert_test_lot(store.pool(), 1, "964", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", None, None).await;
        // same sale batch — excluded
        insert_test_lot(store.pool(), 2, "964", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", Some(200_000.0), d).await;
        // unsold — excluded
        insert_test_lot(store.pool(), 3, "950", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", None, d).await;
        // qualifying
        insert_test_lot(store.pool(), 4, "951", "coin", Some("Au"), Some(12.9), Some("MS63"), Some(1897), "15 рублей 1897", Some(210_000.0), d).await;

        let rows = store.structured_candidates(Metal::Au, 1897, 1, "964").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 4);
    }

    #[tokio::test]
    async fn prediction_upsert_is_idempotent() {
        let store = test_store().await;
        insert_test_lot(store.pool(), 1, "964", "coin", Some("Au"), None, None, None, "", None, None).await;

        let result = PredictionResult {
            predicted_price: Some(214_000.0),
            metal_value: 96_000.0,
            numismatic_premium: Some(118_000.0),
            confidence: 0.65,
            method: PredictionMethod::StatisticalModel,
            sample_size: 3,
        };
        store.upsert_prediction(1, &result).await.unwrap();
        store.upsert_prediction(1, &result).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lot_predictions")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let row = store.prediction(1).await.unwrap().unwrap();
        assert_eq!(row.prediction_method, "statistical_model");
        assert_eq!(row.predicted_price, Some(214_000.0));
        assert_eq!(row.sample_size, 3);
    }

    #[tokio::test]
    async fn progress_roundtrip() {
        let store = test_store().await;
        assert!(store.progress("964").await.unwrap().is_none());

        store.save_progress("964", 120, 25).await.unwrap();
        store.save_progress("964", 145, 50).await.unwrap();
        let row = store.progress("964").await.unwrap().unwrap();
        assert_eq!(row.last_lot_id, 145);
        assert_eq!(row.processed, 50);

        store.clear_progress("964").await.unwrap();
        assert!(store.progress("964").await.unwrap().is_none());
    }
}
