//! Rendered-DOM backend driven through a WebDriver session (`fantoccini`).
//!
//! A [`RenderedDocument`] owns exactly one browser session. Call
//! [`RenderedDocument::release`] when done; the pipeline does so on every
//! exit path.

use async_trait::async_trait;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Value};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::document::{Document, TextJoin};
use crate::error::{ExtractError, RenderError};
use crate::fetch::random_user_agent;
use crate::Mode;

/// Cookie banners and consent overlays worth clicking away.
pub const POPUP_SELECTORS: [&str; 18] = [
    ".cookie-banner",
    ".cookie-notice",
    ".cookie-consent",
    "#cookie-banner",
    "#cookie-notice",
    ".gdpr-banner",
    ".privacy-notice",
    ".consent-banner",
    ".cookie-bar",
    ".cookie-popup",
    ".gdpr-popup",
    ".privacy-popup",
    ".cookie-overlay",
    ".consent-overlay",
    ".privacy-overlay",
    "[data-cookie]",
    "[data-gdpr]",
    "[data-consent]",
];

const POPUP_CONTROLS: &str = "button, .accept, .close, [onclick], a";

/// Words that mark an accept/close control, matched against lower-cased text.
pub const DISMISS_WORDS: [&str; 5] = ["accept", "aceitar", "ok", "fechar", "close"];

const CHROME_ARGS: [&str; 12] = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-images",
    "--disable-web-security",
    "--allow-running-insecure-content",
    "--disable-logging",
    "--log-level=3",
    "--silent",
    "--window-size=1366,900",
];

const READY_STATE_JS: &str = "return document.readyState;";
const SCROLL_HEIGHT_JS: &str = "return document.body ? document.body.scrollHeight : 0;";
const SCROLL_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_TOP_JS: &str = "window.scrollTo(0, 0);";

const SELECT_TEXT_JS: &str = r#"
return Array.from(document.querySelectorAll(arguments[0])).map((el) => el.innerText || '');
"#;

const SELECT_ATTR_JS: &str = r#"
const [selector, name] = arguments;
return Array.from(document.querySelectorAll(selector))
  .map((el) => el.getAttribute(name))
  .filter((value) => value !== null);
"#;

const REMOVE_JS: &str = r#"
const nodes = document.querySelectorAll(arguments[0]);
nodes.forEach((node) => node.remove());
return nodes.length;
"#;

const VISIBLE_TEXT_JS: &str = r#"
const texts = [];
for (const el of document.querySelectorAll('*')) {
  const text = el.innerText ? el.innerText.trim() : '';
  if (!text || el.offsetParent === null) continue;
  const style = getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden') continue;
  texts.push(text);
}
return texts;
"#;

pub struct RenderedDocument {
    client: Client,
    config: RenderConfig,
}

impl RenderedDocument {
    /// Start a browser session, load `url` and wait until it is ready.
    ///
    /// On failure after the session exists, the session is closed before
    /// the error is returned.
    pub async fn open(url: &str, config: &RenderConfig) -> Result<Self, RenderError> {
        let client = connect(config).await?;
        let doc = Self {
            client,
            config: config.clone(),
        };
        let loaded = doc.load(url).await;
        match loaded {
            Ok(()) => Ok(doc),
            Err(err) => {
                doc.release().await;
                Err(err)
            }
        }
    }

    async fn load(&self, url: &str) -> Result<(), RenderError> {
        let started = Instant::now();
        self.client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(self.config.page_load_timeout),
                None,
            ))
            .await?;
        self.client
            .goto(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        settle_ready(self.wait_ready().await)?;
        sleep(self.config.dynamic_content_wait).await;
        info!(elapsed = ?started.elapsed(), "page loaded in browser: {url}");
        Ok(())
    }

    async fn wait_ready(&self) -> Result<(), RenderError> {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            let state = self.client.execute(READY_STATE_JS, vec![]).await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RenderError::NotReady(self.config.ready_timeout));
            }
            sleep(self.config.ready_poll).await;
        }
    }

    /// Close the browser session. Failures are logged, never returned.
    pub async fn release(self) {
        if let Err(err) = self.client.close().await {
            warn!(error = %err, "failed to close browser session");
        } else {
            debug!("browser session closed");
        }
    }

    async fn scroll_height(&self) -> Result<i64, RenderError> {
        let height = self.client.execute(SCROLL_HEIGHT_JS, vec![]).await?;
        Ok(height.as_i64().unwrap_or_default())
    }

    async fn scroll_to_end(&self) -> Result<usize, RenderError> {
        let mut previous = 0;
        let mut rounds = 0;
        while rounds < self.config.max_scrolls {
            self.client.execute(SCROLL_BOTTOM_JS, vec![]).await?;
            sleep(self.config.scroll_pause).await;
            let height = self.scroll_height().await?;
            if height == previous {
                break;
            }
            previous = height;
            rounds += 1;
        }
        self.client.execute(SCROLL_TOP_JS, vec![]).await?;
        sleep(self.config.top_pause).await;
        Ok(rounds)
    }

    async fn try_dismiss(&self, selector: &str) -> Result<bool, RenderError> {
        let popup = self
            .client
            .wait()
            .at_most(self.config.popup_wait)
            .for_element(Locator::Css(selector))
            .await?;
        for control in popup.find_all(Locator::Css(POPUP_CONTROLS)).await? {
            let label = control.text().await.unwrap_or_default();
            if is_dismiss_label(&label) {
                control.click().await?;
                sleep(self.config.click_pause).await;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn execute_strings(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Vec<String>, ExtractError> {
        let value = self
            .client
            .execute(script, args)
            .await
            .map_err(RenderError::from)?;
        Ok(strings(value))
    }
}

async fn connect(config: &RenderConfig) -> Result<Client, RenderError> {
    let mut args: Vec<String> = CHROME_ARGS.iter().map(|a| a.to_string()).collect();
    args.push(format!("--user-agent={}", random_user_agent()));
    if config.headless {
        args.push("--headless".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

    ClientBuilder::native()
        .capabilities(caps)
        .connect(&config.webdriver_url)
        .await
        .map_err(|e| RenderError::Unavailable {
            endpoint: config.webdriver_url.clone(),
            message: e.to_string(),
        })
}

/// A page that never reports `complete` is read as far as it rendered.
/// Every other failure ends the load.
fn settle_ready(outcome: Result<(), RenderError>) -> Result<(), RenderError> {
    match outcome {
        Err(RenderError::NotReady(waited)) => {
            warn!(?waited, "page still loading, continuing with what has rendered");
            Ok(())
        }
        other => other,
    }
}

/// Joins an element's `innerText`, which only holds laid-out text.
fn join_inner_text(raw: &str, join: TextJoin) -> String {
    match join {
        TextJoin::Natural => raw.trim().to_string(),
        TextJoin::Separator(" ") => raw.split_whitespace().collect::<Vec<_>>().join(" "),
        TextJoin::Separator(sep) => raw
            .split(['\t', '\n', '\r'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(sep),
    }
}

/// Whether a control's visible text reads like "accept" or "close".
pub fn is_dismiss_label(label: &str) -> bool {
    let label = label.to_lowercase();
    DISMISS_WORDS.iter().any(|word| label.contains(word))
}

fn strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait(?Send)]
impl Document for RenderedDocument {
    fn mode(&self) -> Mode {
        Mode::Rendered
    }

    async fn title(&self) -> Result<String, ExtractError> {
        let title = self.client.title().await.map_err(RenderError::from)?;
        Ok(title.trim().to_string())
    }

    async fn select_text(
        &self,
        selector: &str,
        join: TextJoin,
    ) -> Result<Vec<String>, ExtractError> {
        let texts = self
            .execute_strings(SELECT_TEXT_JS, vec![json!(selector)])
            .await?;
        Ok(texts
            .iter()
            .map(|raw| join_inner_text(raw, join))
            .collect())
    }

    async fn select_attr(&self, selector: &str, name: &str) -> Result<Vec<String>, ExtractError> {
        self.execute_strings(SELECT_ATTR_JS, vec![json!(selector), json!(name)])
            .await
    }

    async fn remove(&mut self, selector: &str) -> Result<usize, ExtractError> {
        let removed = self
            .client
            .execute(REMOVE_JS, vec![json!(selector)])
            .await
            .map_err(RenderError::from)?;
        Ok(removed.as_u64().unwrap_or_default() as usize)
    }

    async fn visible_texts(&self) -> Result<Option<Vec<String>>, ExtractError> {
        self.execute_strings(VISIBLE_TEXT_JS, vec![]).await.map(Some)
    }

    async fn dismiss_popups(&mut self) -> bool {
        for selector in POPUP_SELECTORS {
            match self.try_dismiss(selector).await {
                Ok(true) => {
                    info!(%selector, "dismissed popup");
                    return true;
                }
                Ok(false) => debug!(%selector, "popup had no dismiss control"),
                Err(err) => debug!(%selector, error = %err, "no popup"),
            }
        }
        false
    }

    async fn materialize(&mut self) {
        match self.scroll_to_end().await {
            Ok(rounds) => debug!(rounds, "lazy content scrolled into view"),
            Err(err) => warn!(error = %err, "scrolling failed"),
        }
        sleep(self.config.settle).await;
    }
}
