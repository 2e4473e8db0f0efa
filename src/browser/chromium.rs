use super::{BrowserError, ElementHandle, ElementInfo, Key, UiPage};
use crate::config::BrowserConfig as SessionConfig;
use crate::mapping::normalize_key;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const REF_ATTR: &str = "data-hermes-ref";

/// Registers the element under a stable `data-hermes-ref` id and reports the
/// geometry the resolver's visibility checks need.
const DESCRIBE_FN: &str = r#"
function __hermesDescribe(el) {
  if (!el.hasAttribute('data-hermes-ref')) {
    window.__hermesRef = (window.__hermesRef || 0) + 1;
    el.setAttribute('data-hermes-ref', String(window.__hermesRef));
  }
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const hidden = style.visibility === 'hidden' || style.display === 'none';
  return {
    ref: Number(el.getAttribute('data-hermes-ref')),
    tag: el.tagName.toLowerCase(),
    text: (el.innerText || el.textContent || '').trim().slice(0, 200),
    label: el.getAttribute('aria-label') || el.getAttribute('placeholder') || el.getAttribute('title') || '',
    value: ('value' in el && typeof el.value === 'string') ? el.value : null,
    width: hidden ? 0 : rect.width,
    height: hidden ? 0 : rect.height,
    disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
  };
}
"#;

/// Page-side twin of `mapping::normalize_key`, applied to both the hint and the
/// element text. NFD folding is a superset of the Polish table; `ł` has no
/// decomposition and is mapped by hand.
const FOLD_FN: &str = r#"
function __hermesFold(value) {
  return String(value || '')
    .toLowerCase()
    .normalize('NFD')
    .replace(/\p{M}/gu, '')
    .replace(/ł/g, 'l')
    .replace(/\s+/g, ' ')
    .trim();
}
"#;

const INTERACTIVE_CSS: &str = "a, button, li, label, [role=\"button\"], [role=\"option\"], \
     [role=\"menuitem\"], [role=\"radio\"], [role=\"checkbox\"], [role=\"link\"], [data-testid]";

/// Script listing the elements under `css`. With a hint, only elements whose
/// folded text or aria-label contains the folded hint are returned; the
/// resolver applies the exact comparison afterwards.
fn describe_script(css: &str, text_hint: Option<&str>) -> Result<String, BrowserError> {
    let selector = serde_json::to_string(css).map_err(|err| BrowserError::Script(err.to_string()))?;
    let hint = serde_json::to_string(&normalize_key(text_hint.unwrap_or("")))
        .map_err(|err| BrowserError::Script(err.to_string()))?;
    Ok(format!(
        r#"(() => {{
  {DESCRIBE_FN}
  {FOLD_FN}
  const hint = __hermesFold({hint});
  const out = [];
  for (const el of document.querySelectorAll({selector})) {{
    if (hint) {{
      const text = __hermesFold((el.innerText || el.textContent || '') + ' ' + (el.getAttribute('aria-label') || ''));
      if (!text.includes(hint)) continue;
    }}
    out.push(__hermesDescribe(el));
    if (out.length >= 200) break;
  }}
  return out;
}})()"#
    ))
}

/// Owns the CDP connection and the task that pumps its event stream.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Attaches to a running browser when `debug_url` is configured, otherwise
    /// launches one with the configured profile so cookies survive restarts.
    pub async fn start(config: &SessionConfig) -> Result<Self, BrowserError> {
        let (browser, mut handler) = match config.debug_url.as_deref() {
            Some(url) => {
                info!(target = "hermes.browser", url, "browser_connect");
                Browser::connect(url)
                    .await
                    .map_err(|err| BrowserError::Unreachable(err.to_string()))?
            }
            None => {
                let mut builder = BrowserConfig::builder().viewport(None);
                if !config.headless {
                    builder = builder.with_head();
                }
                if let Some(profile) = &config.profile_dir {
                    builder = builder.user_data_dir(profile);
                }
                if let Some(executable) = &config.executable {
                    builder = builder.chrome_executable(executable);
                }
                let launch = builder.build().map_err(BrowserError::Unreachable)?;
                info!(target = "hermes.browser", headless = config.headless, "browser_launch");
                Browser::launch(launch)
                    .await
                    .map_err(|err| BrowserError::Unreachable(err.to_string()))?
            }
        };
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target = "hermes.browser", error = %err, "cdp_handler_event_error");
                }
            }
        });
        Ok(Self { browser, handler })
    }

    pub async fn open_page(&self, url: &str) -> Result<ChromiumPage, BrowserError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok(ChromiumPage { page })
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Script(err.to_string()))
    }

    async fn describe_all(&self, css: &str, text_hint: Option<&str>) -> Result<Vec<ElementInfo>, BrowserError> {
        self.eval(describe_script(css, text_hint)?).await
    }

    async fn element(&self, handle: ElementHandle) -> Result<Element, BrowserError> {
        self.page
            .find_element(format!("[{REF_ATTR}=\"{}\"]", handle.0))
            .await
            .map_err(|_| BrowserError::StaleElement(handle.0))
    }

    async fn dispatch_key(&self, key: Key, kind: DispatchKeyEventType) -> Result<(), BrowserError> {
        let (name, code, vk, text) = key.cdp_parts();
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(name)
            .code(code)
            .windows_virtual_key_code(vk);
        if let (Some(text), DispatchKeyEventType::KeyDown) = (text, kind) {
            builder = builder.text(text);
        }
        let params = builder.build().map_err(BrowserError::Input)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| BrowserError::Input(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl UiPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.eval("window.location.href".to_string()).await
    }

    async fn query(&self, css: &str) -> Result<Vec<ElementInfo>, BrowserError> {
        self.describe_all(css, None).await
    }

    async fn interactive_elements(
        &self,
        text_hint: &str,
    ) -> Result<Vec<ElementInfo>, BrowserError> {
        self.describe_all(INTERACTIVE_CSS, Some(text_hint)).await
    }

    async fn click(&self, handle: ElementHandle) -> Result<(), BrowserError> {
        let element = self.element(handle).await?;
        element
            .click()
            .await
            .map_err(|err| BrowserError::Input(err.to_string()))?;
        Ok(())
    }

    async fn type_text(&self, handle: ElementHandle, text: &str) -> Result<(), BrowserError> {
        let element = self.element(handle).await?;
        element
            .click()
            .await
            .map_err(|err| BrowserError::Input(err.to_string()))?;
        // Select the existing content so typing replaces it.
        let _: bool = self
            .eval(format!(
                "(() => {{ const el = document.querySelector('[{REF_ATTR}=\"{}\"]'); \
                 if (!el) return false; el.focus(); if (el.select) el.select(); return true; }})()",
                handle.0
            ))
            .await?;
        element
            .type_str(text)
            .await
            .map_err(|err| BrowserError::Input(err.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), BrowserError> {
        self.dispatch_key(key, DispatchKeyEventType::KeyDown).await?;
        self.dispatch_key(key, DispatchKeyEventType::KeyUp).await
    }

    async fn read_value(&self, handle: ElementHandle) -> Result<String, BrowserError> {
        let value: Option<String> = self
            .eval(format!(
                "(() => {{ const el = document.querySelector('[{REF_ATTR}=\"{}\"]'); \
                 if (!el) return null; \
                 return ('value' in el && typeof el.value === 'string') ? el.value : (el.innerText || el.textContent || '').trim(); }})()",
                handle.0
            ))
            .await?;
        value.ok_or(BrowserError::StaleElement(handle.0))
    }

    async fn upload_files(
        &self,
        handle: ElementHandle,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        let element = self.element(handle).await?;
        let params = SetFileInputFilesParams::builder()
            .files(files.iter().map(|path| path.display().to_string()))
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(BrowserError::Upload)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| BrowserError::Upload(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_hint_is_folded_before_reaching_the_page() {
        let script = describe_script(INTERACTIVE_CSS, Some("  MĘŻCZYŹNI\u{a0}Kurtki ")).expect("script");
        assert!(script.contains(r#"__hermesFold("mezczyzni kurtki")"#));
        assert!(script.contains("__hermesFold((el.innerText"));
        assert!(script.contains("normalize('NFD')"));
    }

    #[test]
    fn plain_queries_carry_an_empty_hint() {
        let script = describe_script("input[name=\"size\"]", None).expect("script");
        assert!(script.contains(r#"__hermesFold("")"#));
        assert!(script.contains(r#"querySelectorAll("input[name=\"size\"]")"#));
    }
}
