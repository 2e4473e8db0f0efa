use super::normalize_key;
use crate::models::Marketplace;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Condition {
    NewWithTags,
    NewWithoutTags,
    VeryGood,
    #[default]
    Good,
    Satisfactory,
}

/// Checked in order against the normalized raw condition; "bardzo dobry"
/// before "dobry", "nowy z metka" before "nowy".
const CONDITION_PHRASES: &[(&str, Condition)] = &[
    ("nowy z metka", Condition::NewWithTags),
    ("nowy z metkami", Condition::NewWithTags),
    ("new with tags", Condition::NewWithTags),
    ("nwt", Condition::NewWithTags),
    ("nowy bez metki", Condition::NewWithoutTags),
    ("nowy bez metek", Condition::NewWithoutTags),
    ("new without tags", Condition::NewWithoutTags),
    ("nowy", Condition::NewWithoutTags),
    ("new", Condition::NewWithoutTags),
    ("bardzo dobry", Condition::VeryGood),
    ("idealny", Condition::VeryGood),
    ("very good", Condition::VeryGood),
    ("zadowalajacy", Condition::Satisfactory),
    ("dostateczny", Condition::Satisfactory),
    ("satisfactory", Condition::Satisfactory),
    ("dobry", Condition::Good),
    ("good", Condition::Good),
];

impl Condition {
    /// Unrecognised input is treated as an ordinary used item.
    pub fn from_label(raw: &str) -> Self {
        let key = normalize_key(raw);
        if key.is_empty() {
            return Condition::default();
        }
        CONDITION_PHRASES
            .iter()
            .find(|(phrase, _)| key.contains(phrase))
            .map(|(_, condition)| *condition)
            .unwrap_or_default()
    }

    pub fn label(&self, marketplace: Marketplace) -> &'static str {
        match marketplace {
            Marketplace::Vinted => match self {
                Condition::NewWithTags => "Nowy z metką",
                Condition::NewWithoutTags => "Nowy bez metki",
                Condition::VeryGood => "Bardzo dobry",
                Condition::Good => "Dobry",
                Condition::Satisfactory => "Zadowalający",
            },
            Marketplace::Grailed => match self {
                Condition::NewWithTags | Condition::NewWithoutTags => "New/Never Worn",
                Condition::VeryGood => "Gently Used",
                Condition::Good => "Used",
                Condition::Satisfactory => "Very Worn",
            },
        }
    }
}
