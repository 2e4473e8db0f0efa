//! The one seam between the publishing pipeline and a live page. Everything
//! above this module talks to [`UiPage`]; the chromiumoxide implementation is
//! the only code that knows about CDP.

pub mod chromium;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub use chromium::{ChromiumPage, ChromiumSession};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser unreachable: {0}")]
    Unreachable(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("element {0} is no longer attached")]
    StaleElement(u64),
    #[error("input dispatch failed: {0}")]
    Input(String),
    #[error("file upload failed: {0}")]
    Upload(String),
}

/// Opaque reference to an element found by a previous query. Only valid until
/// the next navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ElementInfo {
    #[serde(rename = "ref")]
    pub handle: ElementHandle,
    pub tag: String,
    /// Visible text, trimmed.
    pub text: String,
    /// aria-label, placeholder or title, whichever is set first.
    pub label: String,
    pub value: Option<String>,
    pub width: f64,
    pub height: f64,
    pub disabled: bool,
}

impl ElementInfo {
    pub fn has_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn is_actionable(&self) -> bool {
        self.has_size() && !self.disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    Enter,
    Escape,
    Tab,
}

impl Key {
    /// (key, code, windows virtual key code, text)
    pub fn cdp_parts(&self) -> (&'static str, &'static str, i64, Option<&'static str>) {
        match self {
            Key::ArrowDown => ("ArrowDown", "ArrowDown", 40, None),
            Key::Enter => ("Enter", "Enter", 13, Some("\r")),
            Key::Escape => ("Escape", "Escape", 27, None),
            Key::Tab => ("Tab", "Tab", 9, None),
        }
    }
}

#[async_trait]
pub trait UiPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Elements matching a CSS selector, in document order.
    async fn query(&self, css: &str) -> Result<Vec<ElementInfo>, BrowserError>;

    /// Links, buttons, options and menu items that may carry `text_hint`.
    /// Implementations may narrow by the hint; callers still check the text.
    async fn interactive_elements(&self, text_hint: &str)
    -> Result<Vec<ElementInfo>, BrowserError>;

    async fn click(&self, handle: ElementHandle) -> Result<(), BrowserError>;

    /// Focuses the element, replaces its current content and types `text`.
    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<(), BrowserError>;

    async fn press_key(&self, key: Key) -> Result<(), BrowserError>;

    /// Form value for inputs, visible text otherwise.
    async fn read_value(&self, handle: ElementHandle) -> Result<String, BrowserError>;

    async fn upload_files(
        &self,
        handle: ElementHandle,
        files: &[PathBuf],
    ) -> Result<(), BrowserError>;
}
