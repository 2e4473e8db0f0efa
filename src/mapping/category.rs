use super::normalize_key;
use crate::models::Marketplace;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Jacket,
    Coat,
    Vest,
    Hoodie,
    Sweatshirt,
    Sweater,
    TShirt,
    LongSleeve,
    Shirt,
    Polo,
    TankTop,
    Jeans,
    WideLegTrousers,
    CargoPants,
    Sweatpants,
    Trousers,
    Shorts,
    Tracksuit,
    Sneakers,
    Boots,
    Shoes,
    Cap,
    Beanie,
    Bag,
    Backpack,
    Belt,
    Scarf,
    Sunglasses,
    Other,
}

/// Which size vocabulary a category draws from. The same raw "48" is a EU
/// trouser size for pants and a shoe size for footwear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SizeFamily {
    Tops,
    Pants,
    Footwear,
    Accessories,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryPath {
    pub department: &'static str,
    pub category: &'static str,
    pub subcategory: &'static str,
}

const fn path(
    department: &'static str,
    category: &'static str,
    subcategory: &'static str,
) -> CategoryPath {
    CategoryPath {
        department,
        category,
        subcategory,
    }
}

/// Raw label → category. Iteration order is part of the contract: partial
/// matching takes the first hit, so longer phrases precede their prefixes.
const CATEGORY_LABELS: &[(&str, Category)] = &[
    ("kurtka", Category::Jacket),
    ("kurtki", Category::Jacket),
    ("plaszcz", Category::Coat),
    ("kamizelka", Category::Vest),
    ("bluza z kapturem", Category::Hoodie),
    ("hoodie", Category::Hoodie),
    ("bluza", Category::Sweatshirt),
    ("crewneck", Category::Sweatshirt),
    ("sweter", Category::Sweater),
    ("kardigan", Category::Sweater),
    ("longsleeve", Category::LongSleeve),
    ("koszulka z dlugim rekawem", Category::LongSleeve),
    ("koszulka polo", Category::Polo),
    ("polo", Category::Polo),
    ("tank top", Category::TankTop),
    ("koszulka bez rekawow", Category::TankTop),
    ("t-shirt", Category::TShirt),
    ("koszulka", Category::TShirt),
    ("koszula", Category::Shirt),
    ("jeansy", Category::Jeans),
    ("spodnie jeansowe", Category::Jeans),
    ("spodnie z szerokimi nogawkami", Category::WideLegTrousers),
    ("baggy", Category::WideLegTrousers),
    ("bojowki", Category::CargoPants),
    ("spodnie cargo", Category::CargoPants),
    ("spodnie dresowe", Category::Sweatpants),
    ("dresy", Category::Sweatpants),
    ("dres", Category::Tracksuit),
    ("spodnie", Category::Trousers),
    ("szorty", Category::Shorts),
    ("spodenki", Category::Shorts),
    ("sneakersy", Category::Sneakers),
    ("buty sportowe", Category::Sneakers),
    ("glany", Category::Boots),
    ("kozaki", Category::Boots),
    ("buty zimowe", Category::Boots),
    ("buty", Category::Shoes),
    ("czapka z daszkiem", Category::Cap),
    ("czapka zimowa", Category::Beanie),
    ("czapka", Category::Beanie),
    ("nerka", Category::Bag),
    ("torba", Category::Bag),
    ("torebka", Category::Bag),
    ("plecak", Category::Backpack),
    ("pasek", Category::Belt),
    ("szalik", Category::Scarf),
    ("okulary", Category::Sunglasses),
    ("jacket", Category::Jacket),
    ("coat", Category::Coat),
    ("sweatshirt", Category::Sweatshirt),
    ("sweater", Category::Sweater),
    ("shirt", Category::Shirt),
    ("jeans", Category::Jeans),
    ("sweatpants", Category::Sweatpants),
    ("pants", Category::Trousers),
    ("shorts", Category::Shorts),
    ("sneakers", Category::Sneakers),
    ("boots", Category::Boots),
    ("cap", Category::Cap),
    ("bag", Category::Bag),
];

/// Reverse containment ("raw inside key") is only tried for labels at least
/// this long, otherwise a stray "t" would match the first key containing it.
const MIN_REVERSE_MATCH_LEN: usize = 3;

/// Exact-match index; the first table entry wins for duplicated labels.
static EXACT_LABELS: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    let mut index = HashMap::with_capacity(CATEGORY_LABELS.len());
    for (label, category) in CATEGORY_LABELS {
        index.entry(*label).or_insert(*category);
    }
    index
});

impl Category {
    /// Translates a free-text label from the data store. Exact match first,
    /// then substring containment in both directions, then `Other`.
    pub fn from_label(raw: &str) -> Self {
        let key = normalize_key(raw);
        if key.is_empty() {
            return Category::Other;
        }
        if let Some(category) = EXACT_LABELS.get(key.as_str()) {
            return *category;
        }
        CATEGORY_LABELS
            .iter()
            .find(|(label, _)| {
                key.contains(label)
                    || (key.chars().count() >= MIN_REVERSE_MATCH_LEN && label.contains(&key))
            })
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }

    pub fn size_family(&self) -> SizeFamily {
        match self {
            Category::Jacket
            | Category::Coat
            | Category::Vest
            | Category::Hoodie
            | Category::Sweatshirt
            | Category::Sweater
            | Category::TShirt
            | Category::LongSleeve
            | Category::Shirt
            | Category::Polo
            | Category::TankTop
            | Category::Tracksuit => SizeFamily::Tops,
            Category::Jeans
            | Category::WideLegTrousers
            | Category::CargoPants
            | Category::Sweatpants
            | Category::Trousers
            | Category::Shorts => SizeFamily::Pants,
            Category::Sneakers | Category::Boots | Category::Shoes => SizeFamily::Footwear,
            Category::Cap
            | Category::Beanie
            | Category::Bag
            | Category::Backpack
            | Category::Belt
            | Category::Scarf
            | Category::Sunglasses => SizeFamily::Accessories,
            Category::Other => SizeFamily::Generic,
        }
    }

    /// Whether the listing form requires a size for this category.
    pub fn is_sized(&self) -> bool {
        !matches!(
            self,
            Category::Bag | Category::Backpack | Category::Sunglasses | Category::Scarf
        )
    }

    /// Bags and eyewear have no colour picker on some forms.
    pub fn color_required(&self) -> bool {
        self.size_family() != SizeFamily::Accessories
    }

    pub fn short_label(&self) -> Option<&'static str> {
        let label = match self {
            Category::Jacket => "Kurtka",
            Category::Coat => "Płaszcz",
            Category::Vest => "Kamizelka",
            Category::Hoodie | Category::Sweatshirt => "Bluza",
            Category::Sweater => "Sweter",
            Category::TShirt => "T-shirt",
            Category::LongSleeve => "Longsleeve",
            Category::Shirt => "Koszula",
            Category::Polo => "Polo",
            Category::TankTop => "Tank top",
            Category::Jeans => "Jeansy",
            Category::WideLegTrousers | Category::Trousers => "Spodnie",
            Category::CargoPants => "Bojówki",
            Category::Sweatpants => "Dresy",
            Category::Shorts => "Szorty",
            Category::Tracksuit => "Dres",
            Category::Sneakers => "Sneakersy",
            Category::Boots | Category::Shoes => "Buty",
            Category::Cap | Category::Beanie => "Czapka",
            Category::Bag => "Torba",
            Category::Backpack => "Plecak",
            Category::Belt => "Pasek",
            Category::Scarf => "Szalik",
            Category::Sunglasses => "Okulary",
            Category::Other => return None,
        };
        Some(label)
    }

    pub fn path(&self, marketplace: Marketplace) -> CategoryPath {
        match marketplace {
            Marketplace::Vinted => self.vinted_path(),
            Marketplace::Grailed => self.grailed_path(),
        }
    }

    fn vinted_path(&self) -> CategoryPath {
        const MEN: &str = "Mężczyźni";
        match self {
            Category::Jacket => path(MEN, "Okrycia wierzchnie", "Kurtki"),
            Category::Coat => path(MEN, "Okrycia wierzchnie", "Płaszcze"),
            Category::Vest => path(MEN, "Okrycia wierzchnie", "Kamizelki"),
            Category::Hoodie => path(MEN, "Swetry i bluzy", "Bluzy z kapturem"),
            Category::Sweatshirt => path(MEN, "Swetry i bluzy", "Bluzy"),
            Category::Sweater => path(MEN, "Swetry i bluzy", "Swetry"),
            Category::TShirt => path(MEN, "Koszulki", "T-shirty"),
            Category::LongSleeve => path(MEN, "Koszulki", "Koszulki z długim rękawem"),
            Category::Shirt => path(MEN, "Koszule", "Koszule gładkie"),
            Category::Polo => path(MEN, "Koszulki", "Koszulki polo"),
            Category::TankTop => path(MEN, "Koszulki", "Koszulki bez rękawów"),
            Category::Jeans => path(MEN, "Jeansy", "Jeansy proste"),
            Category::WideLegTrousers => path(MEN, "Spodnie", "Spodnie z szerokimi nogawkami"),
            Category::CargoPants => path(MEN, "Spodnie", "Bojówki"),
            Category::Sweatpants => path(MEN, "Odzież sportowa", "Spodnie dresowe"),
            Category::Trousers => path(MEN, "Spodnie", "Inne spodnie"),
            Category::Shorts => path(MEN, "Szorty", "Inne szorty"),
            Category::Tracksuit => path(MEN, "Odzież sportowa", "Dresy"),
            Category::Sneakers => path(MEN, "Obuwie", "Sneakersy"),
            Category::Boots => path(MEN, "Obuwie", "Buty za kostkę"),
            Category::Shoes => path(MEN, "Obuwie", "Inne obuwie"),
            Category::Cap => path(MEN, "Akcesoria", "Czapki z daszkiem"),
            Category::Beanie => path(MEN, "Akcesoria", "Czapki zimowe"),
            Category::Bag => path(MEN, "Akcesoria", "Torby"),
            Category::Backpack => path(MEN, "Akcesoria", "Plecaki"),
            Category::Belt => path(MEN, "Akcesoria", "Paski"),
            Category::Scarf => path(MEN, "Akcesoria", "Szaliki i chusty"),
            Category::Sunglasses => path(MEN, "Akcesoria", "Okulary przeciwsłoneczne"),
            Category::Other => path(MEN, "Ubrania", "Inne"),
        }
    }

    fn grailed_path(&self) -> CategoryPath {
        const MEN: &str = "Menswear";
        match self {
            Category::Jacket => path(MEN, "Outerwear", "Light Jackets"),
            Category::Coat => path(MEN, "Outerwear", "Heavy Coats"),
            Category::Vest => path(MEN, "Outerwear", "Vests"),
            Category::Hoodie | Category::Sweatshirt | Category::Tracksuit => {
                path(MEN, "Tops", "Sweatshirts & Hoodies")
            }
            Category::Sweater => path(MEN, "Tops", "Sweaters & Knitwear"),
            Category::TShirt => path(MEN, "Tops", "Short Sleeve T-Shirts"),
            Category::LongSleeve => path(MEN, "Tops", "Long Sleeve T-Shirts"),
            Category::Shirt => path(MEN, "Tops", "Shirts (Button Ups)"),
            Category::Polo => path(MEN, "Tops", "Polos"),
            Category::TankTop => path(MEN, "Tops", "Sleeveless"),
            Category::Jeans => path(MEN, "Bottoms", "Denim"),
            Category::WideLegTrousers | Category::CargoPants | Category::Trousers => {
                path(MEN, "Bottoms", "Casual Pants")
            }
            Category::Sweatpants => path(MEN, "Bottoms", "Sweatpants & Joggers"),
            Category::Shorts => path(MEN, "Bottoms", "Shorts"),
            Category::Sneakers => path(MEN, "Footwear", "Low-Top Sneakers"),
            Category::Boots => path(MEN, "Footwear", "Boots"),
            Category::Shoes => path(MEN, "Footwear", "Casual Leather Shoes"),
            Category::Cap | Category::Beanie => path(MEN, "Accessories", "Hats"),
            Category::Bag | Category::Backpack => path(MEN, "Accessories", "Bags & Luggage"),
            Category::Belt => path(MEN, "Accessories", "Belts"),
            Category::Scarf => path(MEN, "Accessories", "Gloves & Scarves"),
            Category::Sunglasses => path(MEN, "Accessories", "Sunglasses"),
            Category::Other => path(MEN, "Accessories", "Miscellaneous"),
        }
    }
}

pub fn resolve_category(raw_label: &str, marketplace: Marketplace) -> CategoryPath {
    Category::from_label(raw_label).path(marketplace)
}

/// Display label used in titles: the category's short noun, or the raw label
/// itself (trimmed, first letter capitalised) when the category is unknown.
pub fn shorten_label(raw_label: &str) -> String {
    match Category::from_label(raw_label).short_label() {
        Some(label) => label.to_string(),
        None => capitalize_first(raw_label.trim()),
    }
}

fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
