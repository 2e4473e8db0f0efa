//! Static lookup tables translating free-text advertisement labels into
//! marketplace vocabulary. Everything here is pure and total: unmatched input
//! falls back to a documented default instead of failing.

pub mod category;
pub mod color;
pub mod condition;
pub mod size;

pub use category::{Category, CategoryPath, SizeFamily, resolve_category, shorten_label};
pub use color::{Color, resolve_color};
pub use condition::Condition;
pub use size::{marketplace_size, resolve_size, resolve_size_vocabulary};

/// Lowercases, trims, collapses inner whitespace and folds Polish diacritics
/// so that "Nowy z metką" and "nowy  z metka" compare equal.
pub fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .collect()
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'ą' => 'a',
        'ć' => 'c',
        'ę' => 'e',
        'ł' => 'l',
        'ń' => 'n',
        'ó' => 'o',
        'ś' => 's',
        'ź' | 'ż' => 'z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_key_folds_case_space_and_diacritics() {
        assert_eq!(normalize_key("  Nowy   z METKĄ "), "nowy z metka");
        assert_eq!(normalize_key("Żółty"), "zolty");
    }
}
