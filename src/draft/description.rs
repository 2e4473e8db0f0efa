use super::measurements::measurement_lines;
use super::title::recase_shouting;
use crate::mapping::{Color, Condition};
use crate::models::{Advertisement, Marketplace};

/// Everything the description needs beyond the advertisement itself.
#[derive(Debug, Clone, Default)]
pub struct DescriptionParts<'a> {
    pub header: Option<&'a str>,
    pub short_label: &'a str,
    pub style: Option<&'a str>,
    pub size: &'a str,
    pub color: Option<Color>,
    pub condition: Condition,
    pub footer: Option<&'a str>,
}

/// Blocks are separated by a blank line and always appear in this order:
/// header, starred line, condition/size/colour lines, measurements, footer.
pub fn build_description(
    ad: &Advertisement,
    parts: &DescriptionParts<'_>,
    marketplace: Marketplace,
) -> String {
    let polish = marketplace.is_polish();
    let mut blocks: Vec<String> = Vec::new();

    if let Some(header) = parts.header.map(str::trim).filter(|h| !h.is_empty()) {
        blocks.push(header.to_string());
    }

    let starred = [
        recase_shouting(&ad.brand),
        parts.short_label.to_string(),
        parts.style.map(recase_shouting).unwrap_or_default(),
    ]
    .into_iter()
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    blocks.push(format!("★ {starred} ★"));

    let mut details = Vec::new();
    let flaw = ad
        .flaws
        .as_deref()
        .map(str::trim)
        .filter(|flaw| !flaw.is_empty());
    let condition = parts.condition.label(marketplace);
    details.push(match (polish, flaw) {
        (true, Some(flaw)) => format!("Stan: {condition}, wady: {flaw}"),
        (true, None) => format!("Stan: {condition}, brak wad"),
        (false, Some(flaw)) => format!("Condition: {condition}, flaws: {flaw}"),
        (false, None) => format!("Condition: {condition}, no flaws"),
    });
    if !parts.size.trim().is_empty() {
        let key = if polish { "Rozmiar" } else { "Size" };
        details.push(format!("{key}: {}", parts.size.trim()));
    }
    if let Some(color) = parts.color {
        let key = if polish { "Kolor" } else { "Color" };
        details.push(format!("{key}: {}", color.label(marketplace)));
    }
    blocks.push(details.join("\n"));

    let measurements = measurement_lines(ad, marketplace);
    if !measurements.is_empty() {
        let heading = if polish { "Wymiary:" } else { "Measurements:" };
        blocks.push(format!("{heading}\n{}", measurements.join("\n")));
    }

    if let Some(footer) = parts.footer.map(str::trim).filter(|f| !f.is_empty()) {
        blocks.push(footer.to_string());
    }

    blocks.join("\n\n")
}
