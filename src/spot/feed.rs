//! Defensive parsing of the two upstream price feeds.
//!
//! Both payloads are loosely structured markup scraped from the central-bank
//! site; every accessor degrades to `None` on anything unexpected. Nothing in
//! this module returns an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// USD entry in the daily rates XML.
static USD_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<Valute ID="R01235">.*?<Value>([\d,.]+)</Value>"#)
        .expect("static rates pattern")
});

/// Data row of the metals table: first cell is the date, then four price
/// cells in gold/silver/platinum/palladium order.
static METALS_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<tr>\s*<td>[\d.]+</td>\s*<td[^>]*>([^<]+)</td>\s*<td[^>]*>([^<]+)</td>\s*<td[^>]*>([^<]+)</td>\s*<td[^>]*>([^<]+)</td>\s*</tr>",
    )
    .expect("static metals pattern")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static tag pattern"));

/// Per-gram prices parsed from one metals-feed row. Each metal is nullable —
/// the feed omits cells on some dates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetalPrices {
    pub gold: Option<f64>,
    pub silver: Option<f64>,
    pub platinum: Option<f64>,
    pub palladium: Option<f64>,
}

impl MetalPrices {
    pub fn is_empty(&self) -> bool {
        self.gold.is_none()
            && self.silver.is_none()
            && self.platinum.is_none()
            && self.palladium.is_none()
    }
}

/// Extract the USD exchange rate from the rates-feed XML.
pub fn parse_exchange_rate(xml: &str) -> Option<f64> {
    let caps = USD_VALUE.captures(xml)?;
    parse_price(caps.get(1)?.as_str())
}

/// Extract the four per-gram metal prices from the metals-feed HTML.
pub fn parse_metal_prices(html: &str) -> Option<MetalPrices> {
    let caps = METALS_ROW.captures(html)?;
    let prices = MetalPrices {
        gold: caps.get(1).and_then(|m| parse_price(m.as_str())),
        silver: caps.get(2).and_then(|m| parse_price(m.as_str())),
        platinum: caps.get(3).and_then(|m| parse_price(m.as_str())),
        palladium: caps.get(4).and_then(|m| parse_price(m.as_str())),
    };
    if prices.is_empty() {
        None
    } else {
        Some(prices)
    }
}

/// Parse a price cell: strip residual tags, drop whitespace including the
/// thousands separators, accept decimal comma.
pub fn parse_price(raw: &str) -> Option<f64> {
    let clean = TAGS.replace_all(raw, "");
    let normalized: String = clean
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let price: f64 = normalized.parse().ok()?;
    price.is_finite().then_some(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES_XML: &str = r#"<ValCurs Date="03.06.2025" name="Foreign Currency Market">
        <Valute ID="R01235"><NumCode>840</NumCode><CharCode>USD</CharCode>
        <Nominal>1</Nominal><Name>Доллар США</Name><Value>78,6090</Value></Valute>
        </ValCurs>"#;

    #[test]
    fn parses_usd_rate() {
        assert_eq!(parse_exchange_rate(RATES_XML), Some(78.609));
    }

    #[test]
    fn garbage_xml_degrades_to_none() {
        assert_eq!(parse_exchange_rate("<html>503 Service Unavailable</html>"), None);
        assert_eq!(parse_exchange_rate(""), None);
    }

    #[test]
    fn parses_metals_row() {
        let html = r#"<table><tr><th>Date</th></tr>
            <tr><td>03.06.2025</td><td>8 479,19</td><td>92,54</td><td>2 662,81</td><td>2 486,84</td></tr>
            </table>"#;
        let prices = parse_metal_prices(html).unwrap();
        assert_eq!(prices.gold, Some(8479.19));
        assert_eq!(prices.silver, Some(92.54));
        assert_eq!(prices.platinum, Some(2662.81));
        assert_eq!(prices.palladium, Some(2486.84));
    }

    #[test]
    fn unparseable_cells_are_null_not_errors() {
        let html = r#"<tr><td>03.06.2025</td><td>8 479,19</td><td>—</td><td>n/a</td><td>2 486,84</td></tr>"#;
        let prices = parse_metal_prices(html).unwrap();
        assert_eq!(prices.gold, Some(8479.19));
        assert_eq!(prices.silver, None);
        assert_eq!(prices.platinum, None);
        assert_eq!(prices.palladium, Some(2486.84));
    }

    #[test]
    fn all_cells_unparseable_is_none() {
        let html = r#"<tr><td>03.06.2025</td><td>a</td><td>b</td><td>c</td><td>d</td></tr>"#;
        assert_eq!(parse_metal_prices(html), None);
        assert_eq!(parse_metal_prices("<html></html>"), None);
    }

    #[test]
    fn price_cell_normalization() {
        assert_eq!(parse_price(" 1 234,56 "), Some(1234.56));
        assert_eq!(parse_price("<b>92,54</b>"), Some(92.54));
        assert_eq!(parse_price("92.54"), Some(92.54));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("NaN"), None);
    }
}
