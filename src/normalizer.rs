//! Free-text denomination extraction.
//!
//! An ordered, immutable rule table built once at startup. Each rule demands a
//! leading numeral and word boundaries so "1" never matches inside "15", and
//! first match wins — unit names can be substrings of one another, so order
//! is part of the table's contract.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::DenominationFact;

struct DenominationRule {
    regex: Regex,
    /// Alternation fragment reused when rendering a search pattern.
    unit_pattern: &'static str,
    unit: &'static str,
    /// Subunits per one major unit (100 kopecks = 1 ruble). Units that are
    /// themselves the smallest denomination carry 1.
    subunit_per_major: u32,
}

fn rule(unit_pattern: &'static str, unit: &'static str, subunit_per_major: u32) -> DenominationRule {
    // Numeric token accepts decimal comma or dot.
    let pattern = format!(r"(?i)\b(\d+(?:[.,]\d+)?)\s*({unit_pattern})\b");
    DenominationRule {
        regex: Regex::new(&pattern).expect("static denomination pattern"),
        unit_pattern,
        unit,
        subunit_per_major,
    }
}

static RULES: Lazy<Vec<DenominationRule>> = Lazy::new(|| {
    vec![
        // Kopeck before ruble: both appear in mixed-denomination descriptions
        // and the first hit decides the fact.
        rule(r"копе[её]к\w*|копейка|kopecks?", "kopeck", 1),
        rule(r"рубл\w*|rubles?", "ruble", 100),
        rule(r"талер\w*|thalers?", "thaler", 24),
        rule(r"дукат\w*|ducats?", "ducat", 1),
        rule(r"флорин\w*|florins?", "florin", 100),
        rule(r"крон\w*|kronor|kronas?", "krona", 100),
        rule(r"шиллинг\w*|shillings?", "shilling", 12),
        rule(r"пенни|пенсов|pennies|pence|penny", "penny", 1),
        rule(r"экю|ecus?", "ecu", 1),
        rule(r"стювер\w*|stuivers?", "stuiver", 1),
        rule(r"сольдо|soldo", "soldo", 1),
        rule(r"реал\w*|reales|reals?", "real", 1),
        rule(r"лир\w*|liras?|lire", "lira", 100),
        rule(r"франк\w*|francs?", "franc", 100),
        rule(r"мар[ок]\w*|марка|marks?", "mark", 100),
        rule(r"доллар\w*|dollars?", "dollar", 100),
    ]
});

/// Extract a denomination fact from a lot description. First matching rule
/// wins; None when no rule applies.
pub fn extract(text: &str) -> Option<DenominationFact> {
    for rule in RULES.iter() {
        if let Some(caps) = rule.regex.captures(text) {
            let numeral = caps.get(1)?.as_str();
            let value: f64 = numeral.replace(',', ".").parse().ok()?;
            return Some(DenominationFact {
                value,
                unit: rule.unit,
                subunit_per_major: rule.subunit_per_major,
                matched: caps.get(0)?.as_str().to_string(),
            });
        }
    }
    None
}

/// Render a word-bounded, case-insensitive pattern matching the same
/// denomination in other descriptions. Used by the matcher to narrow a
/// structured sample when no lot-name fragment is available.
pub fn search_pattern(fact: &DenominationFact) -> Option<Regex> {
    let unit_pattern = RULES
        .iter()
        .find(|r| r.unit == fact.unit)
        .map(|r| r.unit_pattern)?;
    let numeral = if fact.value.fract() == 0.0 {
        format!("{}", fact.value as i64)
    } else {
        // Accept either decimal separator on the search side as well.
        regex::escape(&format!("{}", fact.value)).replace(r"\.", "[.,]")
    };
    Regex::new(&format!(r"(?i)\b{numeral}\s*(?:{unit_pattern})\b")).ok()
}
