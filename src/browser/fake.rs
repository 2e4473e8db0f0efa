//! Scripted in-memory page for resolver, executor and pipeline tests.
//!
//! Strict pages only know the elements a test registers. Permissive pages
//! additionally invent a visible element for any selector or text they are
//! asked about, which lets a whole form flow run without scripting every
//! control.

use super::{BrowserError, ElementHandle, ElementInfo, Key, UiPage};
use crate::mapping::normalize_key;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, PartialEq)]
pub enum FakeAction {
    Goto(String),
    Click(ElementHandle),
    Type(ElementHandle, String),
    Key(Key),
    Upload(ElementHandle, Vec<PathBuf>),
}

#[derive(Debug, Clone)]
struct FakeElement {
    info: ElementInfo,
    css: Vec<String>,
    present: bool,
    interactive: bool,
    reveals: Vec<ElementHandle>,
    selects: Option<(ElementHandle, String)>,
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    elements: Vec<FakeElement>,
    next: u64,
    synthetic: HashMap<String, ElementHandle>,
    values: HashMap<ElementHandle, String>,
    actions: Vec<FakeAction>,
    queries: Vec<String>,
    /// Whether every uploaded file existed at the moment of upload.
    upload_files_existed: Vec<bool>,
    /// URL the page moves to when the handle is clicked.
    navigate_on_click: HashMap<ElementHandle, String>,
    /// Control last clicked or typed into. On a permissive page, clicking an
    /// invented text element writes that text into it, like a dropdown pick.
    open_control: Option<ElementHandle>,
}

#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
    permissive: bool,
}

impl FakePage {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = self.state.lock().expect("fake page lock");
        f(&mut guard)
    }

    fn push(&self, css: &[&str], text: &str, present: bool, interactive: bool) -> ElementHandle {
        self.with_state(|state| {
            state.next += 1;
            let handle = ElementHandle(state.next);
            state.elements.push(FakeElement {
                info: ElementInfo {
                    handle,
                    tag: "div".into(),
                    text: text.into(),
                    width: 100.0,
                    height: 20.0,
                    ..Default::default()
                },
                css: css.iter().map(|s| s.to_string()).collect(),
                present,
                interactive,
                reveals: Vec::new(),
                selects: None,
            });
            handle
        })
    }

    /// Visible element matched by any of `css`.
    pub fn add(&self, css: &[&str]) -> ElementHandle {
        self.push(css, "", true, false)
    }

    /// Visible interactive element found by text.
    pub fn add_text(&self, text: &str) -> ElementHandle {
        self.push(&[], text, true, true)
    }

    /// Element that only appears after another element is clicked.
    pub fn add_hidden_text(&self, text: &str) -> ElementHandle {
        self.push(&[], text, false, true)
    }

    pub fn set_size(&self, handle: ElementHandle, width: f64, height: f64) {
        self.update(handle, |el| {
            el.info.width = width;
            el.info.height = height;
        });
    }

    pub fn set_disabled(&self, handle: ElementHandle) {
        self.update(handle, |el| el.info.disabled = true);
    }

    pub fn reveal_on_click(&self, trigger: ElementHandle, target: ElementHandle) {
        self.update(trigger, |el| el.reveals.push(target));
    }

    /// Clicking `option` writes `value` into `trigger`, like a dropdown.
    pub fn select_on_click(&self, option: ElementHandle, trigger: ElementHandle, value: &str) {
        let value = value.to_string();
        self.update(option, |el| el.selects = Some((trigger, value)));
    }

    pub fn navigate_on_click(&self, handle: ElementHandle, url: &str) {
        self.with_state(|state| {
            state.navigate_on_click.insert(handle, url.to_string());
        });
    }

    pub fn set_value(&self, handle: ElementHandle, value: &str) {
        self.with_state(|state| {
            state.values.insert(handle, value.to_string());
        });
    }

    pub fn value(&self, handle: ElementHandle) -> Option<String> {
        self.with_state(|state| state.values.get(&handle).cloned())
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.with_state(|state| state.actions.clone())
    }

    pub fn queries(&self) -> Vec<String> {
        self.with_state(|state| state.queries.clone())
    }

    pub fn upload_files_existed(&self) -> Vec<bool> {
        self.with_state(|state| state.upload_files_existed.clone())
    }

    fn update(&self, handle: ElementHandle, f: impl FnOnce(&mut FakeElement)) {
        self.with_state(|state| {
            if let Some(el) = state.elements.iter_mut().find(|el| el.info.handle == handle) {
                f(el);
            }
        });
    }

    fn synthetic(&self, key: String, text: &str) -> ElementInfo {
        self.with_state(|state| {
            let handle = match state.synthetic.get(&key) {
                Some(handle) => *handle,
                None => {
                    state.next += 1;
                    let handle = ElementHandle(state.next);
                    state.synthetic.insert(key, handle);
                    handle
                }
            };
            ElementInfo {
                handle,
                tag: "div".into(),
                text: text.into(),
                value: state.values.get(&handle).cloned(),
                width: 100.0,
                height: 20.0,
                ..Default::default()
            }
        })
    }

    fn known(&self, handle: ElementHandle) -> bool {
        self.with_state(|state| {
            state
                .elements
                .iter()
                .any(|el| el.present && el.info.handle == handle)
                || state.synthetic.values().any(|h| *h == handle)
        })
    }
}

#[async_trait]
impl UiPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.with_state(|state| {
            state.url = url.to_string();
            state.actions.push(FakeAction::Goto(url.to_string()));
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.with_state(|state| state.url.clone()))
    }

    async fn query(&self, css: &str) -> Result<Vec<ElementInfo>, BrowserError> {
        let scripted: Vec<ElementInfo> = self.with_state(|state| {
            state.queries.push(css.to_string());
            state
                .elements
                .iter()
                .filter(|el| el.present && el.css.iter().any(|c| c == css))
                .map(|el| ElementInfo {
                    value: state.values.get(&el.info.handle).cloned(),
                    ..el.info.clone()
                })
                .collect()
        });
        if scripted.is_empty() && self.permissive {
            return Ok(vec![self.synthetic(format!("css:{css}"), "")]);
        }
        Ok(scripted)
    }

    async fn interactive_elements(
        &self,
        text_hint: &str,
    ) -> Result<Vec<ElementInfo>, BrowserError> {
        let hint = normalize_key(text_hint);
        let scripted: Vec<ElementInfo> = self.with_state(|state| {
            state.queries.push(format!("text:{text_hint}"));
            state
                .elements
                .iter()
                .filter(|el| el.present && el.interactive)
                .filter(|el| {
                    hint.is_empty()
                        || normalize_key(&format!("{} {}", el.info.text, el.info.label)).contains(&hint)
                })
                .map(|el| el.info.clone())
                .collect()
        });
        if scripted.is_empty() && self.permissive {
            return Ok(vec![self.synthetic(format!("text:{text_hint}"), text_hint)]);
        }
        Ok(scripted)
    }

    async fn click(&self, handle: ElementHandle) -> Result<(), BrowserError> {
        if !self.known(handle) {
            return Err(BrowserError::StaleElement(handle.0));
        }
        let permissive = self.permissive;
        self.with_state(|state| {
            state.actions.push(FakeAction::Click(handle));
            let picked = state
                .synthetic
                .iter()
                .find(|(_, h)| **h == handle)
                .and_then(|(key, _)| key.strip_prefix("text:"))
                .map(str::to_string);
            match (picked, state.open_control) {
                (Some(text), Some(control)) if permissive => {
                    state.values.insert(control, text);
                }
                _ => state.open_control = Some(handle),
            }
            let (reveals, selects) = state
                .elements
                .iter()
                .find(|el| el.info.handle == handle)
                .map(|el| (el.reveals.clone(), el.selects.clone()))
                .unwrap_or_default();
            for target in reveals {
                if let Some(el) = state.elements.iter_mut().find(|el| el.info.handle == target) {
                    el.present = true;
                }
            }
            if let Some((trigger, value)) = selects {
                state.values.insert(trigger, value);
            }
            if let Some(url) = state.navigate_on_click.get(&handle).cloned() {
                state.url = url;
            }
        });
        Ok(())
    }

    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<(), BrowserError> {
        if !self.known(handle) {
            return Err(BrowserError::StaleElement(handle.0));
        }
        self.with_state(|state| {
            state.actions.push(FakeAction::Type(handle, text.to_string()));
            state.values.insert(handle, text.to_string());
            state.open_control = Some(handle);
        });
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), BrowserError> {
        self.with_state(|state| state.actions.push(FakeAction::Key(key)));
        Ok(())
    }

    async fn read_value(&self, handle: ElementHandle) -> Result<String, BrowserError> {
        if !self.known(handle) {
            return Err(BrowserError::StaleElement(handle.0));
        }
        Ok(self.with_state(|state| state.values.get(&handle).cloned().unwrap_or_default()))
    }

    async fn upload_files(
        &self,
        handle: ElementHandle,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        if !self.known(handle) {
            return Err(BrowserError::StaleElement(handle.0));
        }
        self.with_state(|state| {
            state
                .upload_files_existed
                .extend(files.iter().map(|path| path.exists()));
            state
                .actions
                .push(FakeAction::Upload(handle, files.to_vec()));
        });
        Ok(())
    }
}
