use crate::models::Marketplace;

/// Grailed truncates titles at 60 characters, Vinted at 100.
pub fn title_limit(marketplace: Marketplace) -> usize {
    match marketplace {
        Marketplace::Vinted => 100,
        Marketplace::Grailed => 60,
    }
}

/// Joins brand, short category label, size and style with single spaces,
/// omitting blank segments. Brand, label and style are de-shouted; the size is
/// kept verbatim so tokens like "XL" and "W32" survive.
pub fn build_title(
    brand: &str,
    label: &str,
    size: &str,
    style: Option<&str>,
    marketplace: Marketplace,
) -> String {
    let segments = [
        recase_shouting(brand),
        recase_shouting(label),
        collapse_whitespace(size),
        style.map(recase_shouting).unwrap_or_default(),
    ];
    let title = segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    truncate_words(&title, title_limit(marketplace))
}

/// "ROCA WEAR" → "Roca Wear". Words with digits, punctuation or any lowercase
/// letter are left alone, as are single letters.
pub fn recase_shouting(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let is_shouting = word.chars().count() > 1
                && word.chars().all(|c| c.is_alphabetic() && c.is_uppercase());
            if is_shouting {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts at the last whole word that fits.
fn truncate_words(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut out = String::new();
    for word in value.split(' ') {
        let extra = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + extra + word.chars().count() > limit {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        value.chars().take(limit).collect()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shouting_brand_is_recased_and_size_kept() {
        let title = build_title("ROCA WEAR", "Kurtka", "L", None, Marketplace::Vinted);
        assert_eq!(title, "Roca Wear Kurtka L");
        let words: Vec<_> = title.split(' ').collect();
        assert_eq!(words[0], "Roca");
        assert_eq!(words.last(), Some(&"L"));
    }

    #[test]
    fn mixed_case_and_digit_words_are_untouched() {
        assert_eq!(recase_shouting("A.P.C. adidas NB990 DIESEL"), "A.P.C. adidas NB990 Diesel");
        assert_eq!(
            build_title("Levi's", "Jeansy", "W32", Some("VINTAGE 90s"), Marketplace::Vinted),
            "Levi's Jeansy W32 Vintage 90s"
        );
    }

    #[test]
    fn empty_segments_are_omitted() {
        assert_eq!(
            build_title("Nike", "  ", "", Some(""), Marketplace::Grailed),
            "Nike"
        );
    }

    #[test]
    fn long_titles_are_cut_on_word_boundary() {
        let style = "Streetwear Oversize Heavyweight Premium Collection Limited";
        let title = build_title("Carhartt", "Kurtka", "XL", Some(style), Marketplace::Grailed);
        assert!(title.chars().count() <= 60);
        assert!(title.starts_with("Carhartt Kurtka XL Streetwear"));
        assert!(!title.ends_with(' '));
    }
}
