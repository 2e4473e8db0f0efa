use crate::models::{Advertisement, Marketplace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Waist,
    Length,
    Width,
    Thigh,
    Inseam,
}

/// Fixed rendering order of the measurements block.
pub const MEASUREMENT_ORDER: [Measurement; 5] = [
    Measurement::Waist,
    Measurement::Length,
    Measurement::Width,
    Measurement::Thigh,
    Measurement::Inseam,
];

impl Measurement {
    pub fn label(&self, marketplace: Marketplace) -> &'static str {
        match (self, marketplace.is_polish()) {
            (Measurement::Waist, true) => "Pas",
            (Measurement::Length, true) => "Długość",
            (Measurement::Width, true) => "Szerokość",
            (Measurement::Thigh, true) => "Udo",
            (Measurement::Inseam, true) => "Nogawka",
            (Measurement::Waist, false) => "Waist",
            (Measurement::Length, false) => "Length",
            (Measurement::Width, false) => "Width",
            (Measurement::Thigh, false) => "Thigh",
            (Measurement::Inseam, false) => "Inseam",
        }
    }

    fn raw<'a>(&self, ad: &'a Advertisement) -> Option<&'a str> {
        match self {
            Measurement::Waist => ad.waist.as_deref(),
            Measurement::Length => ad.length.as_deref(),
            Measurement::Width => ad.width.as_deref(),
            Measurement::Thigh => ad.thigh.as_deref(),
            Measurement::Inseam => ad.inseam.as_deref(),
        }
    }
}

/// `"<Label> <value> cm"` for every measurement the advertisement carries.
pub fn measurement_lines(ad: &Advertisement, marketplace: Marketplace) -> Vec<String> {
    MEASUREMENT_ORDER
        .iter()
        .filter_map(|measurement| {
            let value = measurement.raw(ad).and_then(normalize_centimetres)?;
            Some(format!("{} {} cm", measurement.label(marketplace), value))
        })
        .collect()
}

/// Normalises a centimetre value typed by hand: trims, drops a trailing unit,
/// accepts a decimal comma and strips a redundant ".0". Text that is not a
/// number is kept as typed; blank input yields `None`.
pub fn normalize_centimetres(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_unit = trimmed
        .strip_suffix("cm")
        .or_else(|| trimmed.strip_suffix("CM"))
        .unwrap_or(trimmed)
        .trim();
    if without_unit.is_empty() {
        return None;
    }
    match without_unit.replace(',', ".").parse::<f64>() {
        Ok(number) if number.is_finite() && number > 0.0 => Some(format_number(round_one(number))),
        Ok(_) => None,
        Err(_) => Some(without_unit.to_string()),
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    }
}
