use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metal {
    Au,
    Ag,
    Pt,
    Pd,
    Cu,
    Fe,
    Ni,
}

impl Metal {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Au" | "AU" | "au" => Some(Metal::Au),
            "Ag" | "AG" | "ag" => Some(Metal::Ag),
            "Pt" | "PT" | "pt" => Some(Metal::Pt),
            "Pd" | "PD" | "pd" => Some(Metal::Pd),
            "Cu" | "CU" | "cu" => Some(Metal::Cu),
            "Fe" | "FE" | "fe" => Some(Metal::Fe),
            "Ni" | "NI" | "ni" => Some(Metal::Ni),
            _ => None,
        }
    }

    /// Market-convention fineness used when a lot carries no recorded purity.
    /// Base metals have no intrinsic bullion value worth pricing.
    pub fn purity(self) -> f64 {
        match self {
            Metal::Au | Metal::Ag => 0.9,
            Metal::Pt | Metal::Pd => 0.95,
            Metal::Cu | Metal::Fe | Metal::Ni => 0.0,
        }
    }

    /// Metals tracked by the spot price table.
    pub fn is_precious(self) -> bool {
        matches!(self, Metal::Au | Metal::Ag | Metal::Pt | Metal::Pd)
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Metal::Au => "Au",
            Metal::Ag => "Ag",
            Metal::Pt => "Pt",
            Metal::Pd => "Pd",
            Metal::Cu => "Cu",
            Metal::Fe => "Fe",
            Metal::Ni => "Ni",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Coin,
    Banknote,
    Medal,
    Order,
    Badge,
    Token,
    Jewelry,
    Watch,
    Tableware,
    Other,
}

impl Category {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "coin" => Category::Coin,
            "banknote" => Category::Banknote,
            "medal" => Category::Medal,
            "order" => Category::Order,
            "badge" => Category::Badge,
            "token" => Category::Token,
            "jewelry" => Category::Jewelry,
            "watch" => Category::Watch,
            "tableware" => Category::Tableware,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Coin => "coin",
            Category::Banknote => "banknote",
            Category::Medal => "medal",
            Category::Order => "order",
            Category::Badge => "badge",
            Category::Token => "token",
            Category::Jewelry => "jewelry",
            Category::Watch => "watch",
            Category::Tableware => "tableware",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Lot
// ---------------------------------------------------------------------------

/// A single item offered in a historical or ongoing sale event. Produced by
/// the upstream crawler; immutable to this engine.
#[derive(Debug, Clone)]
pub struct Lot {
    pub id: i64,
    pub category: Category,
    pub metal: Option<Metal>,
    /// Gross weight in grams.
    pub weight: Option<f64>,
    pub grade: Option<String>,
    pub year: Option<i64>,
    pub description: String,
    /// Realized hammer price; None = unsold. Strictly positive when present.
    pub sold_price: Option<f64>,
    /// Sale/auction batch identifier.
    pub sale_id: String,
    pub sale_date: Option<NaiveDate>,
}

/// A prior sold lot judged similar enough to inform a target lot's valuation.
#[derive(Debug, Clone)]
pub struct ComparableLot {
    pub id: i64,
    pub sale_id: String,
    pub price: f64,
    pub metal: Option<Metal>,
    pub weight: Option<f64>,
    pub description: String,
    pub sale_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Denomination
// ---------------------------------------------------------------------------

/// Ephemeral fact extracted from a lot description — never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DenominationFact {
    pub value: f64,
    pub unit: &'static str,
    /// How many subunits make up one major unit (100 kopecks = 1 ruble).
    pub subunit_per_major: u32,
    pub matched: String,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    CategoryExcluded,
    NoSimilarLots,
    SingleSimilarLot,
    StatisticalModel,
}

impl std::fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PredictionMethod::CategoryExcluded => "category_excluded",
            PredictionMethod::NoSimilarLots => "no_similar_lots",
            PredictionMethod::SingleSimilarLot => "single_similar_lot",
            PredictionMethod::StatisticalModel => "statistical_model",
        };
        write!(f, "{s}")
    }
}

/// Persisted 1:1 with a lot, fully overwritten on recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_price: Option<f64>,
    pub metal_value: f64,
    pub numismatic_premium: Option<f64>,
    /// Engine's self-reported reliability, in [0, 1].
    pub confidence: f64,
    pub method: PredictionMethod,
    pub sample_size: usize,
}
