//! Database row types used by sqlx for typed queries, plus their mapping
//! into domain types.

use chrono::NaiveDate;

use crate::types::{Category, ComparableLot, Lot, Metal};

#[derive(Debug, sqlx::FromRow)]
pub struct LotRow {
    pub id: i64,
    pub sale_id: String,
    pub category: String,
    pub metal: Option<String>,
    pub weight: Option<f64>,
    pub grade: Option<String>,
    pub year: Option<i64>,
    pub description: String,
    pub sold_price: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

impl LotRow {
    pub fn into_lot(self) -> Lot {
        Lot {
            id: self.id,
            category: Category::parse(&self.category),
            metal: self.metal.as_deref().and_then(Metal::parse),
            weight: self.weight,
            grade: self.grade,
            year: self.year,
            description: self.description,
            sold_price: self.sold_price,
            sale_id: self.sale_id,
            sale_date: self.sale_date,
        }
    }
}

/// Candidate comparable as read from the store, before description
/// narrowing. The grade travels with it so the matcher can apply the
/// grade rule in one place.
#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub sale_id: String,
    pub sold_price: f64,
    pub metal: Option<String>,
    pub weight: Option<f64>,
    pub grade: Option<String>,
    pub description: String,
    pub sale_date: Option<NaiveDate>,
}

impl CandidateRow {
    pub fn into_comparable(self) -> ComparableLot {
        ComparableLot {
            id: self.id,
            sale_id: self.sale_id,
            price: self.sold_price,
            metal: self.metal.as_deref().and_then(Metal::parse),
            weight: self.weight,
            description: self.description,
            sale_date: self.sale_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PredictionRow {
    pub lot_id: i64,
    pub predicted_price: Option<f64>,
    pub metal_value: f64,
    pub numismatic_premium: Option<f64>,
    pub confidence_score: f64,
    pub prediction_method: String,
    pub sample_size: i64,
    pub computed_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProgressRow {
    pub sale_id: String,
    pub last_lot_id: i64,
    pub processed: i64,
    pub updated_at: i64,
}
