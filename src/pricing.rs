use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    /// Whole units of the target currency.
    pub listing: u32,
    /// Lowest accepted offer, when the marketplace has such a field.
    pub floor: Option<u32>,
    pub rate: f64,
}

/// Converts a local price, applies the percentage markup and rounds to whole
/// units. The floor is `floor_fraction` of the converted price, never above it
/// and never below one unit.
pub fn quote(price_local: f64, rate: f64, markup_percent: f64, floor_fraction: f64) -> PriceQuote {
    let converted = price_local.max(0.0) * rate * (1.0 + markup_percent / 100.0);
    let listing = converted.round().max(1.0) as u32;
    let floor = (floor_fraction > 0.0).then(|| {
        let raw = (f64::from(listing) * floor_fraction.min(1.0)).round();
        (raw as u32).clamp(1, listing)
    });
    PriceQuote {
        listing,
        floor,
        rate,
    }
}

/// Price typed in the local currency, e.g. "120", "120,50 zł", "1 200 PLN".
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect::<String>()
        .replace(',', ".");
    let value: f64 = cleaned.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Amount as typed into a price field: no decimals for whole numbers, two
/// otherwise.
pub fn format_amount(value: f64) -> String {
    let cents = (value * 100.0).round();
    if cents % 100.0 == 0.0 {
        format!("{:.0}", cents / 100.0)
    } else {
        format!("{:.2}", cents / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_applies_rate_markup_and_floor() {
        let q = quote(200.0, 0.25, 30.0, 0.8);
        assert_eq!(q.listing, 65);
        assert_eq!(q.floor, Some(52));
    }

    #[test]
    fn quote_never_goes_below_one_unit() {
        let q = quote(1.0, 0.25, 0.0, 0.8);
        assert_eq!(q.listing, 1);
        assert_eq!(q.floor, Some(1));
        assert_eq!(quote(100.0, 0.25, 30.0, 0.0).floor, None);
    }

    #[test]
    fn parse_price_accepts_common_spellings() {
        assert_eq!(parse_price("120"), Some(120.0));
        assert_eq!(parse_price("120,50 zł"), Some(120.5));
        assert_eq!(parse_price("1 200 PLN"), Some(1200.0));
        assert_eq!(parse_price("za darmo"), None);
        assert_eq!(parse_price("0"), None);
    }

    #[test]
    fn amounts_drop_trailing_zero_cents() {
        assert_eq!(format_amount(120.0), "120");
        assert_eq!(format_amount(120.5), "120.50");
        assert_eq!(format_amount(99.999), "100");
    }
}
