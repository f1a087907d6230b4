//! Comparable-sales matching.
//!
//! One strategy is selected per target lot, then candidates fetched from the
//! store are narrowed in Rust. Text handling stays on this side of the SQL
//! boundary: SQLite's `lower()` only folds ASCII, and most descriptions are
//! Cyrillic.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::EXACT_TEXT_MATCH_LIMIT;
use crate::db::models::CandidateRow;
use crate::db::LotStore;
use crate::error::Result;
use crate::normalizer;
use crate::policy::{self, GradeRule, MatchStrategy};
use crate::types::{ComparableLot, Lot};

// The year digits are usually glued to a Cyrillic "г" ("1897г."), and "г" is
// a word character, so a plain trailing \b would reject the dominant format.
static YEAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}(?:г|\b)").expect("static year pattern"));

/// Description text before the first four-digit year token — the stable
/// "name" part of a lot title like `15 рублей 1897г. АГ. Au`.
fn lot_name_prefix(description: &str) -> Option<String> {
    let m = YEAR_TOKEN.find(description)?;
    let prefix = description[..m.start()].trim();
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn grade_matches(rule: GradeRule, target: Option<&str>, candidate: Option<&str>) -> bool {
    match rule {
        GradeRule::Exact => match (target, candidate) {
            (Some(t), Some(c)) => t.trim() == c.trim(),
            (None, None) => true,
            _ => false,
        },
        GradeRule::AnyOf(whitelist) => match candidate {
            Some(c) => {
                let c = c.trim();
                target.map(str::trim) == Some(c) || whitelist.contains(&c)
            }
            None => target.is_none(),
        },
    }
}

/// Find comparables for a predictable lot. The category gate is the caller's
/// job; this function assumes the lot passed it.
pub async fn find_comparables(store: &LotStore, lot: &Lot) -> Result<Vec<ComparableLot>> {
    match policy::select_strategy(lot.category, lot.year, lot.metal) {
        MatchStrategy::ExactText => exact_text_comparables(store, lot).await,
        MatchStrategy::Structured { grades } => structured_comparables(store, lot, grades).await,
    }
}

/// Byte-for-byte equality of normalized descriptions, capped at the most
/// recent sales. Medals and orders carry no reliable structured attributes.
async fn exact_text_comparables(store: &LotStore, lot: &Lot) -> Result<Vec<ComparableLot>> {
    let target = normalize(&lot.description);
    if target.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = store.sold_candidates(lot.id, &lot.sale_id).await?;
    let comparables = candidates
        .into_iter()
        .filter(|c| normalize(&c.description) == target)
        .take(EXACT_TEXT_MATCH_LIMIT as usize)
        .map(CandidateRow::into_comparable)
        .collect();
    Ok(comparables)
}

/// Metal+year equality in SQL, then the grade rule, then one of two
/// description narrowings: the lot-name prefix when the title carries one,
/// otherwise the extracted denomination. Never both.
async fn structured_comparables(
    store: &LotStore,
    lot: &Lot,
    grades: GradeRule,
) -> Result<Vec<ComparableLot>> {
    let (Some(metal), Some(year)) = (lot.metal, lot.year) else {
        return Ok(Vec::new());
    };

    let candidates = store
        .structured_candidates(metal, year, lot.id, &lot.sale_id)
        .await?;

    let graded = candidates
        .into_iter()
        .filter(|c| grade_matches(grades, lot.grade.as_deref(), c.grade.as_deref()));

    let comparables: Vec<ComparableLot> = if let Some(prefix) = lot_name_prefix(&lot.description) {
        let needle = normalize(&prefix);
        graded
            .filter(|c| normalize(&c.description).contains(&needle))
            .map(CandidateRow::into_comparable)
            .collect()
    } else if let Some(re) = normalizer::extract(&lot.description)
        .as_ref()
        .and_then(normalizer::search_pattern)
    {
        graded
            .filter(|c| re.is_match(&c.description))
            .map(CandidateRow::into_comparable)
            .collect()
    } else {
        graded.map(CandidateRow::into_comparable).collect()
    };

    Ok(comparables)
}
