use super::category::{Category, SizeFamily};
use super::normalize_key;
use crate::models::Marketplace;

pub const UNIVERSAL: &str = "Universal";
pub const ADJUSTABLE: &str = "Adjustable";

const TOPS: &[&str] = &["XXS", "XS", "S", "M", "L", "XL", "XXL", "XXXL"];

const PANTS: &[&str] = &[
    "W26", "W27", "W28", "W29", "W30", "W31", "W32", "W33", "W34", "W35", "W36", "W38", "W40",
    "W42", "W44",
];

const FOOTWEAR: &[&str] = &[
    "36", "36.5", "37", "37.5", "38", "38.5", "39", "39.5", "40", "40.5", "41", "41.5", "42",
    "42.5", "43", "43.5", "44", "44.5", "45", "45.5", "46", "46.5", "47", "47.5", "48",
];

const ACCESSORIES: &[&str] = &[UNIVERSAL, ADJUSTABLE, "S", "M", "L"];

const GENERIC: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", UNIVERSAL];

const UNIVERSAL_ALIASES: &[&str] = &[
    "universal",
    "uniwersalny",
    "uniwersalna",
    "uniwersalne",
    "rozmiar uniwersalny",
    "one size",
    "onesize",
    "one-size",
    "os",
    "o/s",
];

const ADJUSTABLE_ALIASES: &[&str] = &[
    "adjustable",
    "adj",
    "regulowany",
    "regulowana",
    "regulowane",
    "regulacja",
];

const LETTER_ALIASES: &[(&str, &str)] = &[
    ("2xs", "XXS"),
    ("2xl", "XXL"),
    ("3xl", "XXXL"),
    ("xxxs", "XXS"),
];

/// EU men's shoe size → US size as listed on Grailed.
const EU_TO_US_SHOE: &[(&str, &str)] = &[
    ("36", "4"),
    ("36.5", "4.5"),
    ("37", "5"),
    ("37.5", "5"),
    ("38", "5.5"),
    ("38.5", "6"),
    ("39", "6.5"),
    ("39.5", "6.5"),
    ("40", "7"),
    ("40.5", "7.5"),
    ("41", "8"),
    ("41.5", "8"),
    ("42", "8.5"),
    ("42.5", "9"),
    ("43", "9.5"),
    ("43.5", "9.5"),
    ("44", "10"),
    ("44.5", "10.5"),
    ("45", "11"),
    ("45.5", "11.5"),
    ("46", "12"),
    ("46.5", "12"),
    ("47", "12.5"),
    ("47.5", "13"),
    ("48", "13.5"),
];

/// Waist sizes in inches a bare number may denote.
const WAIST_RANGE: std::ops::RangeInclusive<u32> = 26..=44;
/// EU trouser sizes; waist in inches is the EU size minus 16.
const EU_TROUSER_RANGE: std::ops::RangeInclusive<u32> = 42..=60;

impl SizeFamily {
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            SizeFamily::Tops => TOPS,
            SizeFamily::Pants => PANTS,
            SizeFamily::Footwear => FOOTWEAR,
            SizeFamily::Accessories => ACCESSORIES,
            SizeFamily::Generic => GENERIC,
        }
    }
}

pub fn resolve_size_vocabulary(raw_label: &str) -> &'static [&'static str] {
    Category::from_label(raw_label).size_family().vocabulary()
}

/// Maps a raw size onto the category's vocabulary. Tries an exact match, the
/// universal/adjustable aliases, family-specific extraction from the
/// individual tokens ("48|W31" → "W31"), then per-token exact match. Anything
/// still unmatched comes back trimmed but otherwise unchanged.
pub fn resolve_size(raw_size: &str, raw_label: &str) -> String {
    resolve_in_family(raw_size, Category::from_label(raw_label).size_family())
}

fn resolve_in_family(raw_size: &str, family: SizeFamily) -> String {
    let trimmed = raw_size.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let vocab = family.vocabulary();
    if let Some(token) = exact(vocab, trimmed) {
        return token.to_string();
    }
    if let Some(token) = alias(trimmed, vocab) {
        return token.to_string();
    }

    let parts = split_parts(trimmed);
    let extracted = match family {
        SizeFamily::Pants => pants_token(&parts),
        SizeFamily::Footwear => footwear_token(&parts),
        _ => None,
    };
    if let Some(token) = extracted {
        return token;
    }

    parts
        .iter()
        .find_map(|part| exact(vocab, part).or_else(|| alias(part, vocab)))
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.to_string())
}

/// Renders a resolved size token the way the marketplace's size picker shows it.
pub fn marketplace_size(token: &str, family: SizeFamily, marketplace: Marketplace) -> String {
    match (marketplace, token) {
        (Marketplace::Vinted, UNIVERSAL) => "Uniwersalny".to_string(),
        (Marketplace::Vinted, ADJUSTABLE) => "Regulowany".to_string(),
        (Marketplace::Grailed, UNIVERSAL | ADJUSTABLE) => "ONE SIZE".to_string(),
        (Marketplace::Grailed, _) if family == SizeFamily::Pants => token
            .strip_prefix('W')
            .filter(|rest| rest.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(token)
            .to_string(),
        (Marketplace::Grailed, _) if family == SizeFamily::Footwear => EU_TO_US_SHOE
            .iter()
            .find(|(eu, _)| *eu == token)
            .map(|(_, us)| us.to_string())
            .unwrap_or_else(|| token.to_string()),
        _ => token.to_string(),
    }
}

fn exact(vocab: &'static [&'static str], candidate: &str) -> Option<&'static str> {
    vocab
        .iter()
        .find(|token| token.eq_ignore_ascii_case(candidate))
        .copied()
}

fn alias(candidate: &str, vocab: &'static [&'static str]) -> Option<&'static str> {
    let key = normalize_key(candidate);
    if UNIVERSAL_ALIASES.contains(&key.as_str()) {
        return Some(UNIVERSAL);
    }
    if ADJUSTABLE_ALIASES.contains(&key.as_str()) {
        return Some(if vocab.contains(&ADJUSTABLE) {
            ADJUSTABLE
        } else {
            UNIVERSAL
        });
    }
    LETTER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, token)| *token)
        .filter(|token| vocab.contains(token))
}

fn split_parts(raw: &str) -> Vec<String> {
    raw.split(['|', '/', ';', '(', ')', ' '])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn pants_token(parts: &[String]) -> Option<String> {
    // An explicit waist token wins over anything numeric.
    let explicit = parts.iter().find_map(|part| {
        let upper = part.to_uppercase();
        let digits = upper.strip_prefix('W')?;
        let waist: u32 = digits.parse().ok()?;
        waist_token(waist)
    });
    if explicit.is_some() {
        return explicit;
    }
    parts.iter().find_map(|part| {
        let number: u32 = part.parse().ok()?;
        if WAIST_RANGE.contains(&number) {
            waist_token(number)
        } else if EU_TROUSER_RANGE.contains(&number) {
            waist_token(number - 16)
        } else {
            None
        }
    })
}

fn waist_token(waist: u32) -> Option<String> {
    let token = format!("W{waist}");
    exact(PANTS, &token).map(str::to_string)
}

fn footwear_token(parts: &[String]) -> Option<String> {
    parts.iter().find_map(|part| {
        let upper = part.to_uppercase();
        let stripped = upper
            .trim_start_matches("EUR")
            .trim_start_matches("EU")
            .trim_end_matches("EU")
            .replace(',', ".");
        let cleaned = stripped.trim().trim_end_matches(".0");
        exact(FOOTWEAR, cleaned).map(str::to_string)
    })
}
