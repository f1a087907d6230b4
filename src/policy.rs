//! Category policy gate — the single seam the pipeline consults before
//! choosing a comparable-matching strategy.

use crate::config::MODERN_YEAR_CUTOFF;
use crate::types::{Category, Metal};

/// Categories whose lots never get a comparable-sales prediction: too
/// heterogeneous for any matching to produce an economically meaningful
/// sample. They still get a metal-value-only result.
const EXCLUDED: &[Category] = &[
    Category::Jewelry,
    Category::Watch,
    Category::Tableware,
    Category::Other,
];

/// Categories where structured attributes (year, grade, denomination) are
/// unreliable and only byte-for-byte normalized description equality is
/// trusted for comparables.
const EXACT_TEXT: &[Category] = &[
    Category::Medal,
    Category::Order,
    Category::Badge,
    Category::Token,
];

/// Grade codes accepted for modern issues in place of exact grade equality.
/// Slab grading is finer than the market distinguishes for current coinage.
pub const MODERN_GRADES: &[&str] = &["PF", "UNC", "MS70", "MS65", "AU"];

/// Grade codes accepted for platinum lots. Pt trades so thinly that exact
/// grade equality starves the sample to zero.
pub const PLATINUM_GRADES: &[&str] =
    &["AU", "AU55", "AU58", "AUDet.", "XF", "XF+/AU", "UNC", "MS60"];

pub fn is_predictable(category: Category) -> bool {
    !EXCLUDED.contains(&category)
}

pub fn requires_exact_text_match(category: Category) -> bool {
    EXACT_TEXT.contains(&category)
}

/// How grade equality is relaxed for a structured search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeRule {
    Exact,
    /// Accept the target's own grade or any grade in the whitelist.
    AnyOf(&'static [&'static str]),
}

/// Matching strategy, selected once per lot before any querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    ExactText,
    Structured { grades: GradeRule },
}

/// Pick the strategy for a predictable lot. Callers must consult
/// [`is_predictable`] first; excluded categories never reach matching.
pub fn select_strategy(category: Category, year: Option<i64>, metal: Option<Metal>) -> MatchStrategy {
    if requires_exact_text_match(category) {
        return MatchStrategy::ExactText;
    }
    let grades = match (year, metal) {
        (Some(y), _) if y >= MODERN_YEAR_CUTOFF => GradeRule::AnyOf(MODERN_GRADES),
        (_, Some(Metal::Pt)) => GradeRule::AnyOf(PLATINUM_GRADES),
        _ => GradeRule::Exact,
    };
    MatchStrategy::Structured { grades }
}
