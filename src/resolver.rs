//! Ordered-fallback element location. Every form control is described as a
//! [`Target`]: a list of candidate locators tried in order, so a markup change
//! on the marketplace only costs one more candidate in a table.

use crate::browser::{BrowserError, ElementHandle, ElementInfo, Key, UiPage};
use crate::mapping::normalize_key;
use crate::retry::{Backoff, WaitOutcome};
use std::{fmt, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    /// `[role=..]` whose accessible name or text contains `name`.
    Role { role: String, name: Option<String> },
    Attribute { name: String, value: String },
    /// Interactive element whose visible text contains the string.
    Text(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Locator::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text(text.into())
    }

    /// CSS for structural locators; `None` for text predicates.
    fn to_css(&self) -> Option<String> {
        match self {
            Locator::Css(css) => Some(css.clone()),
            Locator::Role { role, .. } => Some(format!("[role=\"{}\"]", escape_attr(role))),
            Locator::Attribute { name, value } => {
                Some(format!("[{}=\"{}\"]", name, escape_attr(value)))
            }
            Locator::Text(_) => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "css({css})"),
            Locator::Role { role, name: Some(name) } => write!(f, "role({role}, {name})"),
            Locator::Role { role, name: None } => write!(f, "role({role})"),
            Locator::Attribute { name, value } => write!(f, "attr({name}={value})"),
            Locator::Text(text) => write!(f, "text({text})"),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One logical UI control and the ways to find it.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: &'static str,
    pub candidates: Vec<Locator>,
    /// ArrowDown + Enter is an acceptable stand-in when nothing matches.
    pub keyboard_fallback: bool,
    /// Accept zero-size matches (file inputs are usually hidden).
    pub allow_hidden: bool,
}

impl Target {
    pub fn new(name: &'static str, candidates: Vec<Locator>) -> Self {
        Self {
            name,
            candidates,
            keyboard_fallback: false,
            allow_hidden: false,
        }
    }

    pub fn with_keyboard_fallback(mut self) -> Self {
        self.keyboard_fallback = true;
        self
    }

    pub fn allow_hidden(mut self) -> Self {
        self.allow_hidden = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Element {
        handle: ElementHandle,
        /// Index into `Target::candidates` of the locator that matched.
        candidate: usize,
        info: ElementInfo,
    },
    /// Nothing matched; ArrowDown + Enter was sent to the focused control.
    Keyboard,
}

impl Resolved {
    pub fn handle(&self) -> Option<ElementHandle> {
        match self {
            Resolved::Element { handle, .. } => Some(*handle),
            Resolved::Keyboard => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{target}` not found after trying {tried} candidate(s)")]
    NotFound { target: &'static str, tried: usize },
    #[error("resolution of `{0}` cancelled")]
    Cancelled(&'static str),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

pub struct Resolver<'a> {
    page: &'a dyn UiPage,
    timeout: Duration,
    poll: Duration,
    cancel: CancellationToken,
}

impl<'a> Resolver<'a> {
    pub fn new(page: &'a dyn UiPage, timeout: Duration, poll: Duration) -> Self {
        Self {
            page,
            timeout,
            poll,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Polls the candidate list until one matches or the timeout passes. Each
    /// round walks the candidates in order and stops at the first hit, so a
    /// later candidate is never consulted once an earlier one matched.
    pub async fn resolve(&self, target: &Target) -> Result<Resolved, ResolveError> {
        let backoff = Backoff::within(self.timeout, self.poll);
        let outcome = backoff
            .poll(&self.cancel, move |_| async move {
                match self.try_once(target).await {
                    Ok(found) => found,
                    Err(err) => {
                        debug!(target = "hermes.resolver", control = target.name, error = %err, "probe_failed");
                        None
                    }
                }
            })
            .await;
        match outcome {
            WaitOutcome::Ready((candidate, info)) => {
                debug!(
                    target = "hermes.resolver",
                    control = target.name,
                    candidate,
                    locator = %target.candidates[candidate],
                    "target_resolved"
                );
                Ok(Resolved::Element {
                    handle: info.handle,
                    candidate,
                    info,
                })
            }
            WaitOutcome::Cancelled => Err(ResolveError::Cancelled(target.name)),
            WaitOutcome::Exhausted { .. } => {
                if target.keyboard_fallback {
                    self.page.press_key(Key::ArrowDown).await?;
                    self.page.press_key(Key::Enter).await?;
                    debug!(target = "hermes.resolver", control = target.name, "keyboard_fallback");
                    return Ok(Resolved::Keyboard);
                }
                Err(ResolveError::NotFound {
                    target: target.name,
                    tried: target.candidates.len(),
                })
            }
        }
    }

    /// Single check of the current page state without waiting.
    pub async fn probe(&self, target: &Target) -> Result<Option<ElementInfo>, BrowserError> {
        Ok(self.try_once(target).await?.map(|(_, info)| info))
    }

    async fn try_once(&self, target: &Target) -> Result<Option<(usize, ElementInfo)>, BrowserError> {
        for (index, locator) in target.candidates.iter().enumerate() {
            if let Some(info) = self.match_locator(locator, target.allow_hidden).await? {
                return Ok(Some((index, info)));
            }
        }
        Ok(None)
    }

    async fn match_locator(
        &self,
        locator: &Locator,
        allow_hidden: bool,
    ) -> Result<Option<ElementInfo>, BrowserError> {
        let usable = |el: &ElementInfo| {
            if allow_hidden {
                !el.disabled
            } else {
                el.is_actionable()
            }
        };
        match locator {
            Locator::Text(needle) => {
                let wanted = normalize_key(needle);
                if wanted.is_empty() {
                    return Ok(None);
                }
                let elements = self.page.interactive_elements(needle).await?;
                Ok(elements.into_iter().find(|el| {
                    usable(el)
                        && (normalize_key(&el.text).contains(&wanted)
                            || normalize_key(&el.label).contains(&wanted))
                }))
            }
            Locator::Role {
                name: Some(name), ..
            } => {
                let wanted = normalize_key(name);
                let css = locator.to_css().unwrap_or_default();
                let elements = self.page.query(&css).await?;
                Ok(elements.into_iter().find(|el| {
                    usable(el)
                        && (normalize_key(&el.label).contains(&wanted)
                            || normalize_key(&el.text).contains(&wanted))
                }))
            }
            _ => {
                let css = locator.to_css().unwrap_or_default();
                let elements = self.page.query(&css).await?;
                Ok(elements.into_iter().find(|el| usable(el)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeAction, FakePage};

    fn resolver(page: &FakePage) -> Resolver<'_> {
        Resolver::new(page, Duration::from_millis(20), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn second_candidate_wins_and_third_is_never_tried() {
        let page = FakePage::strict();
        let second = page.add(&["#second"]);
        page.add(&["#third"]);
        let target = Target::new(
            "size trigger",
            vec![
                Locator::css("#first"),
                Locator::css("#second"),
                Locator::css("#third"),
            ],
        );
        let resolved = resolver(&page).resolve(&target).await.expect("resolved");
        assert_eq!(resolved.handle(), Some(second));
        assert!(matches!(resolved, Resolved::Element { candidate: 1, .. }));
        assert_eq!(page.queries(), vec!["#first".to_string(), "#second".to_string()]);
    }

    #[tokio::test]
    async fn zero_size_and_disabled_matches_are_skipped() {
        let page = FakePage::strict();
        let hidden = page.add(&["#a"]);
        page.set_size(hidden, 0.0, 0.0);
        let disabled = page.add(&["[data-testid=\"b\"]"]);
        page.set_disabled(disabled);
        let role = page.add(&["[role=\"combobox\"]"]);
        let target = Target::new(
            "brand",
            vec![
                Locator::css("#a"),
                Locator::attr("data-testid", "b"),
                Locator::role("combobox", None),
            ],
        );
        let resolved = resolver(&page).resolve(&target).await.expect("resolved");
        assert_eq!(resolved.handle(), Some(role));
    }

    #[tokio::test]
    async fn hidden_file_inputs_are_accepted_when_allowed() {
        let page = FakePage::strict();
        let input = page.add(&["input[type=\"file\"]"]);
        page.set_size(input, 0.0, 0.0);
        let target = Target::new("photo input", vec![Locator::css("input[type=\"file\"]")]);
        assert!(resolver(&page).resolve(&target).await.is_err());
        let resolved = resolver(&page)
            .resolve(&target.allow_hidden())
            .await
            .expect("hidden ok");
        assert_eq!(resolved.handle(), Some(input));
    }

    #[tokio::test]
    async fn text_predicate_matches_case_and_diacritic_insensitively() {
        let page = FakePage::strict();
        page.add_text("Kurtki zimowe");
        let option = page.add_text("Mężczyźni");
        let target = Target::new("department", vec![Locator::text("MEZCZYZNI")]);
        let resolved = resolver(&page).resolve(&target).await.expect("text match");
        assert_eq!(resolved.handle(), Some(option));
    }

    #[tokio::test]
    async fn text_predicate_folds_whitespace_in_rendered_labels() {
        let page = FakePage::strict();
        page.add_text("Kobiety");
        let option = page.add_text(" Mężczyźni\u{a0}\n  Kurtki ");
        let target = Target::new("category", vec![Locator::text("MEZCZYZNI KURTKI")]);
        let resolved = resolver(&page).resolve(&target).await.expect("text match");
        assert_eq!(
            resolved,
            Resolved::Element {
                handle: option,
                candidate: 0,
                info: ElementInfo {
                    handle: option,
                    tag: "div".into(),
                    text: " Mężczyźni\u{a0}\n  Kurtki ".into(),
                    width: 100.0,
                    height: 20.0,
                    ..Default::default()
                },
            }
        );
        assert_eq!(page.queries(), vec!["text:MEZCZYZNI KURTKI".to_string()]);
    }

    #[tokio::test]
    async fn keyboard_fallback_only_when_declared() {
        let page = FakePage::strict();
        let target = Target::new("color option", vec![Locator::text("Czarny")]);
        let err = resolver(&page).resolve(&target).await.expect_err("not found");
        assert!(matches!(err, ResolveError::NotFound { tried: 1, .. }));
        assert!(page.actions().is_empty());

        let resolved = resolver(&page)
            .resolve(&target.with_keyboard_fallback())
            .await
            .expect("fallback");
        assert_eq!(resolved, Resolved::Keyboard);
        assert_eq!(
            page.actions(),
            vec![FakeAction::Key(Key::ArrowDown), FakeAction::Key(Key::Enter)]
        );
    }

    #[tokio::test]
    async fn element_revealed_later_is_found_within_timeout() {
        let page = FakePage::strict();
        let option = page.add_hidden_text("W31");
        let trigger = page.add(&["#size"]);
        page.reveal_on_click(trigger, option);
        let target = Target::new("size option", vec![Locator::text("W31")]);
        let handle = page.clone();
        let opener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            handle.click(trigger).await
        });
        let resolver = Resolver::new(&page, Duration::from_millis(200), Duration::from_millis(2));
        let resolved = resolver.resolve(&target).await.expect("revealed");
        assert_eq!(resolved.handle(), Some(option));
        opener.await.expect("join").expect("click");
    }
}
