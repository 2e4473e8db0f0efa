use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    #[default]
    Vinted,
    Grailed,
}

impl Marketplace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Vinted => "vinted",
            Marketplace::Grailed => "grailed",
        }
    }

    pub fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "vinted" | "vinted.pl" => Some(Marketplace::Vinted),
            "grailed" | "grailed.com" => Some(Marketplace::Grailed),
            _ => None,
        }
    }

    /// Column holding the publish-flag for this marketplace.
    pub fn publish_column(&self) -> &'static str {
        match self {
            Marketplace::Vinted => "published_vinted",
            Marketplace::Grailed => "published_grailed",
        }
    }

    pub fn home_url(&self) -> &'static str {
        match self {
            Marketplace::Vinted => "https://www.vinted.pl",
            Marketplace::Grailed => "https://www.grailed.com",
        }
    }

    pub fn create_listing_url(&self) -> &'static str {
        match self {
            Marketplace::Vinted => "https://www.vinted.pl/items/new",
            Marketplace::Grailed => "https://www.grailed.com/sell/new",
        }
    }

    pub fn max_photos(&self) -> usize {
        match self {
            Marketplace::Vinted => 20,
            Marketplace::Grailed => 16,
        }
    }

    pub fn is_polish(&self) -> bool {
        matches!(self, Marketplace::Vinted)
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the advertisements table.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Advertisement {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub flaws: Option<String>,
    #[serde(default)]
    pub waist: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub thigh: Option<String>,
    #[serde(default)]
    pub inseam: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub photo_rotations: Vec<Option<i32>>,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub published_vinted: bool,
    #[serde(default)]
    pub published_grailed: bool,
}

impl Advertisement {
    pub fn is_published(&self, marketplace: Marketplace) -> bool {
        match marketplace {
            Marketplace::Vinted => self.published_vinted,
            Marketplace::Grailed => self.published_grailed,
        }
    }

    /// Names of the mandatory fields that are blank. Empty means eligible.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.brand.trim().is_empty() {
            missing.push("brand");
        }
        if self.category.trim().is_empty() {
            missing.push("category");
        }
        if self.size.trim().is_empty() {
            missing.push("size");
        }
        if self.condition.trim().is_empty() {
            missing.push("condition");
        }
        if !self.photos.iter().any(|uri| !uri.trim().is_empty()) {
            missing.push("photos");
        }
        missing
    }

    /// Rotation declared for the photo at `index`, in degrees.
    pub fn rotation_for(&self, index: usize) -> i32 {
        self.photo_rotations
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StyleRecord {
    pub id: i64,
    #[serde(default)]
    pub product_type: String,
    /// Short descriptor appended to titles, e.g. "Vintage Streetwear".
    #[serde(default)]
    pub style_name: String,
    #[serde(default)]
    pub footer: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HeaderRecord {
    pub id: i64,
    pub marketplace: Marketplace,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunRequest {
    #[serde(default)]
    pub marketplace: Marketplace,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StepReport {
    pub step: String,
    pub outcome: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepReport {
    pub fn new(step: &str, outcome: &str, elapsed_ms: u128, detail: Option<String>) -> Self {
        Self {
            step: step.to_string(),
            outcome: outcome.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
