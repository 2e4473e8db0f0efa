use super::normalize_key;
use crate::models::Marketplace;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Color {
    Black,
    White,
    Gray,
    Navy,
    Blue,
    Red,
    Burgundy,
    Green,
    Olive,
    Yellow,
    Orange,
    Pink,
    Purple,
    Brown,
    Beige,
    Cream,
    Khaki,
    Gold,
    Silver,
    #[default]
    Multi,
}

/// Stem → colour. Stems match the start of any word, so "czarny", "czarna"
/// and "czarne" all hit "czarn". Checked in order; "granat" must precede
/// anything that would otherwise claim navy as blue.
const COLOR_STEMS: &[(&str, Color)] = &[
    ("czarn", Color::Black),
    ("black", Color::Black),
    ("bial", Color::White),
    ("white", Color::White),
    ("szar", Color::Gray),
    ("grafit", Color::Gray),
    ("gray", Color::Gray),
    ("grey", Color::Gray),
    ("granat", Color::Navy),
    ("navy", Color::Navy),
    ("niebiesk", Color::Blue),
    ("blekit", Color::Blue),
    ("blue", Color::Blue),
    ("bordo", Color::Burgundy),
    ("burgund", Color::Burgundy),
    ("czerwon", Color::Red),
    ("red", Color::Red),
    ("oliw", Color::Olive),
    ("olive", Color::Olive),
    ("zielon", Color::Green),
    ("green", Color::Green),
    ("zolt", Color::Yellow),
    ("yellow", Color::Yellow),
    ("pomarancz", Color::Orange),
    ("orange", Color::Orange),
    ("rozow", Color::Pink),
    ("pink", Color::Pink),
    ("fiolet", Color::Purple),
    ("purple", Color::Purple),
    ("braz", Color::Brown),
    ("brown", Color::Brown),
    ("bezow", Color::Beige),
    ("beige", Color::Beige),
    ("krem", Color::Cream),
    ("ecru", Color::Cream),
    ("cream", Color::Cream),
    ("khaki", Color::Khaki),
    ("zlot", Color::Gold),
    ("gold", Color::Gold),
    ("srebr", Color::Silver),
    ("silver", Color::Silver),
    ("wielokolor", Color::Multi),
    ("multi", Color::Multi),
];

impl Color {
    pub fn label(&self, marketplace: Marketplace) -> &'static str {
        if marketplace.is_polish() {
            self.polish()
        } else {
            self.english()
        }
    }

    fn polish(&self) -> &'static str {
        match self {
            Color::Black => "Czarny",
            Color::White => "Biały",
            Color::Gray => "Szary",
            Color::Navy => "Granatowy",
            Color::Blue => "Niebieski",
            Color::Red => "Czerwony",
            Color::Burgundy => "Bordowy",
            Color::Green => "Zielony",
            Color::Olive => "Oliwkowy",
            Color::Yellow => "Żółty",
            Color::Orange => "Pomarańczowy",
            Color::Pink => "Różowy",
            Color::Purple => "Fioletowy",
            Color::Brown => "Brązowy",
            Color::Beige => "Beżowy",
            Color::Cream => "Kremowy",
            Color::Khaki => "Khaki",
            Color::Gold => "Złoty",
            Color::Silver => "Srebrny",
            Color::Multi => "Wielokolorowy",
        }
    }

    fn english(&self) -> &'static str {
        match self {
            Color::Black => "Black",
            Color::White => "White",
            Color::Gray => "Gray",
            Color::Navy => "Navy",
            Color::Blue => "Blue",
            Color::Red => "Red",
            Color::Burgundy => "Burgundy",
            Color::Green => "Green",
            Color::Olive => "Olive",
            Color::Yellow => "Yellow",
            Color::Orange => "Orange",
            Color::Pink => "Pink",
            Color::Purple => "Purple",
            Color::Brown => "Brown",
            Color::Beige => "Beige",
            Color::Cream => "Cream",
            Color::Khaki => "Khaki",
            Color::Gold => "Gold",
            Color::Silver => "Silver",
            Color::Multi => "Multi",
        }
    }
}

/// The first word of the raw colour that starts with a known stem decides.
/// Blank or unknown input yields `Color::Multi`.
pub fn resolve_color(raw: Option<&str>) -> Color {
    let Some(raw) = raw else {
        return Color::default();
    };
    let key = normalize_key(raw);
    key.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            COLOR_STEMS
                .iter()
                .find(|(stem, _)| word.starts_with(stem))
                .map(|(_, color)| *color)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polish_inflections_share_a_stem() {
        for raw in ["czarny", "Czarna", "CZARNE", " czarni "] {
            assert_eq!(resolve_color(Some(raw)), Color::Black, "{raw}");
        }
        assert_eq!(resolve_color(Some("Żółta")), Color::Yellow);
        assert_eq!(resolve_color(Some("beżowy")), Color::Beige);
        assert_eq!(resolve_color(Some("granatowa")), Color::Navy);
    }

    #[test]
    fn first_recognised_word_wins() {
        assert_eq!(resolve_color(Some("ciemno-zielony / czarny")), Color::Green);
        assert_eq!(resolve_color(Some("Navy Blue")), Color::Navy);
    }

    #[test]
    fn preposition_bez_is_not_read_as_beige() {
        assert_eq!(resolve_color(Some("bez nadruku, czarny")), Color::Black);
        assert_eq!(resolve_color(Some("bez wzoru")), Color::Multi);
        assert_eq!(resolve_color(Some("Beżowe")), Color::Beige);
    }

    #[test]
    fn unknown_or_missing_colour_falls_back_to_multi() {
        assert_eq!(resolve_color(None), Color::Multi);
        assert_eq!(resolve_color(Some("")), Color::Multi);
        assert_eq!(resolve_color(Some("kameleon")), Color::Multi);
        assert_eq!(Color::Multi.label(Marketplace::Vinted), "Wielokolorowy");
    }

    #[test]
    fn labels_follow_marketplace_language() {
        assert_eq!(Color::White.label(Marketplace::Vinted), "Biały");
        assert_eq!(Color::White.label(Marketplace::Grailed), "White");
    }
}
