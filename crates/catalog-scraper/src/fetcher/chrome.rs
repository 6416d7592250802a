//! Headless Chrome backend over the DevTools protocol.
//!
//! One browser process is launched lazily and reused serially; each load
//! opens a fresh tab that is closed when the [`ChromePage`] is released.
//! A browser that can no longer open tabs is dropped so the next load
//! relaunches it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{FetchOptions, PageFetcher, PageHandle};
use crate::error::ScraperError;

/// Runs before any page script so `navigator.webdriver` reads as `false`.
const WEBDRIVER_SHIM: &str =
    "Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => false });";

/// No request may be in flight for this long before the network counts as idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ChromeFetcher {
    browser: Mutex<Option<Arc<Browser>>>,
    options: FetchOptions,
}

impl ChromeFetcher {
    #[must_use]
    pub fn new(options: FetchOptions) -> Self {
        Self {
            browser: Mutex::new(None),
            options,
        }
    }

    async fn get_or_launch(&self) -> Result<Arc<Browser>, ScraperError> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg(format!(
                "--lang={}",
                primary_language(&self.options.accept_language)
            ));
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScraperError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::BrowserLaunch(e.to_string()))?;
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!(headless = self.options.headless, "chrome launched");
        let shared = Arc::new(browser);
        *guard = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// Drops the cached browser if it is still `stale`, so the next load
    /// launches a new one.
    async fn forget(&self, stale: &Arc<Browser>) {
        let mut guard = self.browser.lock().await;
        if clear_if_current(&mut guard, stale) {
            tracing::warn!("chrome stopped opening tabs; it will be relaunched");
        }
    }

    /// Closes the browser process if it was launched and no page still holds it.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.take() {
            match Arc::try_unwrap(browser) {
                Ok(mut browser) => {
                    if let Err(e) = browser.close().await {
                        tracing::warn!(error = %e, "chrome close failed");
                    }
                }
                Err(_) => tracing::warn!("chrome still in use at shutdown; leaving it to exit"),
            }
        }
    }

    /// Sets identity headers and hides the automation flag before navigation.
    async fn prepare(&self, page: &Page) -> Result<(), ScraperError> {
        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(self.options.user_agent.as_str())
            .accept_language(self.options.accept_language.as_str())
            .build()
            .map_err(|e| ScraperError::browser("building user-agent override", e))?;
        page.execute(identity)
            .await
            .map_err(|e| ScraperError::browser("setting user agent", e))?;

        let shim = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(WEBDRIVER_SHIM)
            .build()
            .map_err(|e| ScraperError::browser("building webdriver shim", e))?;
        page.execute(shim)
            .await
            .map_err(|e| ScraperError::browser("installing webdriver shim", e))?;

        page.execute(EnableParams::default())
            .await
            .map_err(|e| ScraperError::browser("enabling network events", e))?;
        Ok(())
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<(), ScraperError> {
        let timeout = self.options.navigation_timeout;
        let settled = tokio::time::timeout(timeout, async {
            let watch = NetworkWatch::attach(page).await?;
            page.goto(url)
                .await
                .map_err(|e| ScraperError::browser(format!("navigating to {url}"), e))?;
            watch.wait_for_idle(page).await
        })
        .await;

        match settled {
            Ok(result) => result,
            Err(_) => Err(ScraperError::NavigationTimeout {
                url: url.to_owned(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

impl PageFetcher for ChromeFetcher {
    type Page = ChromePage;

    async fn load(&self, url: &str) -> Result<ChromePage, ScraperError> {
        let browser = self.get_or_launch().await?;
        let tab = match browser.new_page("about:blank").await {
            Ok(tab) => tab,
            Err(e) => {
                self.forget(&browser).await;
                return Err(ScraperError::browser("opening a tab", e));
            }
        };
        let guard = PageGuard::new(tab, url);

        let loaded = match guard.page() {
            Ok(page) => match self.prepare(page).await {
                Ok(()) => self.navigate(page, url).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = loaded {
            guard.close().await;
            return Err(e);
        }

        let final_url = match guard.page() {
            Ok(page) => page.url().await.ok().flatten(),
            Err(_) => None,
        }
        .unwrap_or_else(|| url.to_owned());

        Ok(ChromePage {
            guard,
            url: final_url,
        })
    }
}

/// Clears `slot` when it still holds `stale`. A browser another load has
/// already replaced is left alone.
fn clear_if_current<T>(slot: &mut Option<Arc<T>>, stale: &Arc<T>) -> bool {
    if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stale)) {
        *slot = None;
        true
    } else {
        false
    }
}

/// Requests seen on the wire that have neither finished nor failed.
#[derive(Debug)]
struct IdleTracker {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl IdleTracker {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    fn started(&mut self, request_id: String, now: Instant) {
        self.in_flight.insert(request_id);
        self.last_change = now;
    }

    /// Requests that began before the listeners attached are ignored.
    fn settled(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.in_flight.is_empty() && now.duration_since(self.last_change) >= QUIET_WINDOW
    }
}

/// CDP network event subscriptions for one tab. Attach before `goto` so the
/// document request itself is counted.
struct NetworkWatch {
    started: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl NetworkWatch {
    async fn attach(page: &Page) -> Result<Self, ScraperError> {
        let context = "subscribing to network events";
        Ok(Self {
            started: page
                .event_listener::<EventRequestWillBeSent>()
                .await
                .map_err(|e| ScraperError::browser(context, e))?,
            finished: page
                .event_listener::<EventLoadingFinished>()
                .await
                .map_err(|e| ScraperError::browser(context, e))?,
            failed: page
                .event_listener::<EventLoadingFailed>()
                .await
                .map_err(|e| ScraperError::browser(context, e))?,
        })
    }

    /// Waits until the document is complete and no request has been in
    /// flight for [`QUIET_WINDOW`]. The caller bounds the total wait.
    async fn wait_for_idle(mut self, page: &Page) -> Result<(), ScraperError> {
        let mut tracker = IdleTracker::new(Instant::now());
        let mut poll = tokio::time::interval(IDLE_POLL_INTERVAL);

        loop {
            tokio::select! {
                Some(event) = self.started.next() => {
                    tracker.started(event.request_id.inner().clone(), Instant::now());
                }
                Some(event) = self.finished.next() => {
                    tracker.settled(event.request_id.inner(), Instant::now());
                }
                Some(event) = self.failed.next() => {
                    tracker.settled(event.request_id.inner(), Instant::now());
                }
                _ = poll.tick() => {
                    if tracker.is_idle(Instant::now()) && document_complete(page).await? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn document_complete(page: &Page) -> Result<bool, ScraperError> {
    let state: String = evaluate(page, "document.readyState", "reading document state").await?;
    Ok(state == "complete")
}

async fn evaluate<T: DeserializeOwned>(
    page: &Page,
    script: impl Into<String>,
    context: &str,
) -> Result<T, ScraperError> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| ScraperError::browser(context, e))?;
    page.evaluate_expression(params)
        .await
        .map_err(|e| ScraperError::browser(context, e))?
        .into_value::<T>()
        .map_err(|e| ScraperError::browser(context, e))
}

/// First tag of an `Accept-Language` value, e.g. `en-US` from `en-US,en;q=0.9`.
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}

/// What a DOM query script reads from each matched element.
enum Read<'a> {
    Text,
    Attribute(&'a str),
}

#[derive(Deserialize)]
struct QueryResult {
    values: Vec<Option<String>>,
}

/// Builds a script that polls for `selector` until it matches or `wait`
/// elapses, then reads text or an attribute from the first (or every) match.
fn query_script(selector: &str, read: &Read<'_>, all: bool, wait: Duration) -> String {
    let selector = serde_json::Value::from(selector);
    let attribute = match read {
        Read::Text => serde_json::Value::Null,
        Read::Attribute(name) => serde_json::Value::from(*name),
    };
    let wait_ms = wait.as_millis();
    format!(
        r"(async () => {{
  const sel = {selector};
  const attr = {attribute};
  const deadline = Date.now() + {wait_ms};
  let nodes = Array.from(document.querySelectorAll(sel));
  while (nodes.length === 0 && Date.now() < deadline) {{
    await new Promise(r => setTimeout(r, 100));
    nodes = Array.from(document.querySelectorAll(sel));
  }}
  const read = n => attr === null ? (n.textContent || '') : n.getAttribute(attr);
  const picked = {all} ? nodes : nodes.slice(0, 1);
  return {{ values: picked.map(read) }};
}})()"
    )
}

/// A loaded Chrome tab.
pub struct ChromePage {
    guard: PageGuard,
    url: String,
}

impl ChromePage {
    async fn run_query(
        &self,
        selector: &str,
        read: &Read<'_>,
        all: bool,
        wait: Duration,
    ) -> Result<Vec<Option<String>>, ScraperError> {
        let page = self.guard.page()?;
        let script = query_script(selector, read, all, wait);
        let result: QueryResult = evaluate(page, script, "querying the DOM")
            .await
            .map_err(|e| match e {
                ScraperError::Browser { reason, .. } if reason.contains("SyntaxError") => {
                    ScraperError::InvalidSelector {
                        selector: selector.to_owned(),
                        reason,
                    }
                }
                other => other,
            })?;
        Ok(result.values)
    }
}

impl PageHandle for ChromePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        let values = self.run_query(selector, &Read::Text, false, wait).await?;
        Ok(values.into_iter().next().flatten())
    }

    async fn query_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        let values = self
            .run_query(selector, &Read::Attribute(attribute), false, wait)
            .await?;
        Ok(values.into_iter().next().flatten())
    }

    async fn query_all_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        let values = self.run_query(selector, &Read::Text, true, wait).await?;
        Ok(values.into_iter().flatten().collect())
    }

    async fn query_all_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        let values = self
            .run_query(selector, &Read::Attribute(attribute), true, wait)
            .await?;
        Ok(values.into_iter().flatten().collect())
    }

    async fn close(self) {
        self.guard.close().await;
    }
}

/// Owns a tab and guarantees it is closed exactly once.
///
/// `close` is the normal path. If the guard is dropped without it (a panic
/// or a cancelled future), `Drop` spawns the close on the runtime captured
/// at construction.
struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime: Option<tokio::runtime::Handle>,
}

impl PageGuard {
    fn new(page: Page, url: &str) -> Self {
        Self {
            page: Some(page),
            url: url.to_owned(),
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::browser("using a page", "page already closed"))
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!(url = %self.url, error = %e, "failed to close page");
            } else {
                tracing::debug!(url = %self.url, "page closed");
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let url = std::mem::take(&mut self.url);
        if let Some(runtime) = &self.runtime {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::warn!(url = %url, error = %e, "page cleanup on drop failed");
                }
            });
        } else {
            tracing::warn!(url = %url, "page dropped outside a runtime; tab leaked");
        }
    }
}
