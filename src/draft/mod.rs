//! Turns one advertisement row into marketplace-ready form values. Pure and
//! deterministic: the same advertisement plus the same auxiliary snapshot
//! always produces a byte-identical draft.

pub mod description;
pub mod measurements;
pub mod title;

use crate::mapping::{
    Category, CategoryPath, Color, Condition, SizeFamily, marketplace_size, normalize_key,
    resolve_category, resolve_color, resolve_size, resolve_size_vocabulary, shorten_label,
};
use crate::models::{Advertisement, HeaderRecord, Marketplace, StyleRecord};
use crate::pricing::parse_price;
use description::{DescriptionParts, build_description};
use serde::Serialize;
use title::build_title;
use tracing::debug;

/// Style and header records fetched from the store ahead of drafting. When the
/// lookups failed the draft is built from the advertisement alone.
#[derive(Debug, Clone)]
pub enum Auxiliary {
    Available {
        /// Result of the lookup keyed by the advertisement's product sub-type.
        exact_style: Option<StyleRecord>,
        active_styles: Vec<StyleRecord>,
        headers: Vec<HeaderRecord>,
    },
    Unavailable,
}

impl Auxiliary {
    fn style_for(&self, ad: &Advertisement) -> Option<&StyleRecord> {
        let Auxiliary::Available {
            exact_style,
            active_styles,
            ..
        } = self
        else {
            return None;
        };
        let wanted = ad.product_type.as_deref().map(normalize_key);
        exact_style
            .as_ref()
            .filter(|style| style.is_active)
            .or_else(|| {
                wanted.as_ref().and_then(|wanted| {
                    active_styles
                        .iter()
                        .find(|style| style.is_active && normalize_key(&style.product_type) == *wanted)
                })
            })
            .or_else(|| active_styles.iter().find(|style| style.is_active))
    }

    fn header_for(&self, marketplace: Marketplace) -> Option<&HeaderRecord> {
        match self {
            Auxiliary::Available { headers, .. } => headers
                .iter()
                .find(|header| header.is_active && header.marketplace == marketplace),
            Auxiliary::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDraft {
    pub advertisement_id: i64,
    pub marketplace: Marketplace,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub category_path: CategoryPath,
    pub size_family: SizeFamily,
    /// Canonical token from the category's size vocabulary.
    pub size: String,
    /// The same token as the marketplace's size picker spells it.
    pub size_label: String,
    pub color: Color,
    /// Whether the advertisement named a colour at all.
    pub color_declared: bool,
    pub condition: Condition,
    pub brand: String,
    pub style: Option<String>,
    pub price_local: Option<f64>,
    pub photo_count: usize,
}

impl ListingDraft {
    pub fn requires_size(&self) -> bool {
        self.category.is_sized()
    }

    pub fn requires_color(&self) -> bool {
        self.category.color_required()
    }
}

pub fn build_draft(
    ad: &Advertisement,
    marketplace: Marketplace,
    auxiliary: &Auxiliary,
) -> ListingDraft {
    let category = Category::from_label(&ad.category);
    let size_family = category.size_family();
    let size = resolve_size(&ad.size, &ad.category);
    if !size.is_empty() && !resolve_size_vocabulary(&ad.category).contains(&size.as_str()) {
        debug!(
            target = "hermes.draft",
            advertisement_id = ad.id,
            size = %size,
            "size_outside_vocabulary"
        );
    }
    let size_label = marketplace_size(&size, size_family, marketplace);
    let color = resolve_color(ad.color.as_deref());
    let color_declared = ad
        .color
        .as_deref()
        .is_some_and(|raw| !raw.trim().is_empty());
    let condition = Condition::from_label(&ad.condition);
    let short_label = shorten_label(&ad.category);

    let style = auxiliary.style_for(ad);
    let style_name = style
        .map(|style| style.style_name.trim())
        .filter(|name| !name.is_empty());
    let footer = style.map(|style| style.footer.as_str());
    let header = auxiliary
        .header_for(marketplace)
        .map(|header| header.text.as_str());

    let title = build_title(&ad.brand, &short_label, &size_label, style_name, marketplace);
    let description = build_description(
        ad,
        &DescriptionParts {
            header,
            short_label: &short_label,
            style: style_name,
            size: &size_label,
            color: color_declared.then_some(color),
            condition,
            footer,
        },
        marketplace,
    );

    let photo_count = ad
        .photos
        .iter()
        .filter(|uri| !uri.trim().is_empty())
        .count()
        .min(marketplace.max_photos());

    ListingDraft {
        advertisement_id: ad.id,
        marketplace,
        title,
        description,
        category,
        category_path: resolve_category(&ad.category, marketplace),
        size_family,
        size,
        size_label,
        color,
        color_declared,
        condition,
        brand: ad.brand.trim().to_string(),
        style: style_name.map(str::to_string),
        price_local: ad.price.as_deref().and_then(parse_price),
        photo_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fishbone() -> Advertisement {
        Advertisement {
            id: 42,
            brand: "Fishbone".into(),
            category: "Spodnie z szerokimi nogawkami".into(),
            size: "48|W31".into(),
            condition: "dobry".into(),
            photos: vec!["https://cdn.example/1.jpg".into()],
            ..Default::default()
        }
    }

    fn auxiliary() -> Auxiliary {
        Auxiliary::Available {
            exact_style: None,
            active_styles: vec![
                StyleRecord {
                    id: 1,
                    product_type: "kurtka".into(),
                    style_name: "Outdoor".into(),
                    footer: "Stopka kurtki".into(),
                    is_active: true,
                },
                StyleRecord {
                    id: 2,
                    product_type: "baggy".into(),
                    style_name: "Y2K Baggy".into(),
                    footer: "Stopka baggy".into(),
                    is_active: true,
                },
            ],
            headers: vec![
                HeaderRecord {
                    id: 1,
                    marketplace: Marketplace::Grailed,
                    text: "Ships worldwide".into(),
                    is_active: true,
                },
                HeaderRecord {
                    id: 2,
                    marketplace: Marketplace::Vinted,
                    text: "Cześć!".into(),
                    is_active: true,
                },
            ],
        }
    }

    #[test]
    fn end_to_end_wide_leg_trousers() {
        let ad = fishbone();
        let vinted = build_draft(&ad, Marketplace::Vinted, &Auxiliary::Unavailable);
        assert_eq!(vinted.size, "W31");
        assert_ne!(vinted.size, "48");
        assert!(vinted.description.contains("Stan: Dobry"));
        assert_eq!(vinted.category_path.subcategory, "Spodnie z szerokimi nogawkami");

        let grailed = build_draft(&ad, Marketplace::Grailed, &Auxiliary::Unavailable);
        assert_eq!(grailed.size, "W31");
        assert_eq!(grailed.size_label, "31");
        assert!(grailed.description.contains("Condition: Used"));
        assert_eq!(grailed.title, "Fishbone Spodnie 31");
    }

    #[test]
    fn drafting_is_deterministic() {
        let ad = fishbone();
        let aux = auxiliary();
        let first = build_draft(&ad, Marketplace::Vinted, &aux);
        let second = build_draft(&ad, Marketplace::Vinted, &aux);
        assert_eq!(first, second);
        assert_eq!(first.description.as_bytes(), second.description.as_bytes());
    }

    #[test]
    fn style_matches_product_type_then_falls_back_to_first_active() {
        let mut ad = fishbone();
        ad.product_type = Some("Baggy".into());
        let draft = build_draft(&ad, Marketplace::Vinted, &auxiliary());
        assert_eq!(draft.style.as_deref(), Some("Y2K Baggy"));
        assert!(draft.description.ends_with("Stopka baggy"));
        assert!(draft.description.starts_with("Cześć!"));

        ad.product_type = Some("nieznany".into());
        let draft = build_draft(&ad, Marketplace::Vinted, &auxiliary());
        assert_eq!(draft.style.as_deref(), Some("Outdoor"));
    }

    #[test]
    fn exact_style_lookup_wins() {
        let ad = fishbone();
        let aux = Auxiliary::Available {
            exact_style: Some(StyleRecord {
                id: 9,
                product_type: "spodnie".into(),
                style_name: "Skate".into(),
                footer: "Skate footer".into(),
                is_active: true,
            }),
            active_styles: vec![],
            headers: vec![],
        };
        let draft = build_draft(&ad, Marketplace::Grailed, &aux);
        assert_eq!(draft.title, "Fishbone Spodnie 31 Skate");
        assert!(draft.description.ends_with("Skate footer"));
    }

    #[test]
    fn unavailable_auxiliary_yields_minimal_description() {
        let draft = build_draft(&fishbone(), Marketplace::Vinted, &Auxiliary::Unavailable);
        assert!(draft.description.starts_with("★ Fishbone Spodnie ★"));
        assert!(draft.style.is_none());
        assert!(!draft.color_declared);
        assert!(!draft.description.contains("Kolor"));
    }

    #[test]
    fn photo_count_is_capped() {
        let mut ad = fishbone();
        ad.photos = (0..25).map(|i| format!("https://cdn.example/{i}.jpg")).collect();
        assert_eq!(build_draft(&ad, Marketplace::Vinted, &Auxiliary::Unavailable).photo_count, 20);
        assert_eq!(build_draft(&ad, Marketplace::Grailed, &Auxiliary::Unavailable).photo_count, 16);
    }
}
