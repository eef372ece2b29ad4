//! An in-memory driver for tests.
//!
//! Elements are registered under the exact locator string that will query
//! them; no selector engine is involved. Every primitive call is appended to
//! the page's log with the (tokio) time it happened, and a small text-editing
//! model lets keyboard sequences change input values.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use super::{
    poll_until, BrowserDriver, ClickParams, DriverError, DriverResult, ElementDriver,
    ElementHandle, GotoOptions, Launcher, PageDriver, ScreenshotParams, Viewport, WaitOptions,
    VALUE_FUNCTION, WINDOW_DIMENSIONS_SCRIPT,
};
use crate::browser::options::Options;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bytes returned by every fake screenshot.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One primitive call observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Goto(String),
    WaitForNavigation,
    SetDefaultNavigationTimeout(u64),
    SetViewport(Viewport),
    QuerySelectorAll(String),
    XPath(String),
    WaitForSelector(String, WaitOptions),
    WaitForXPath(String, WaitOptions),
    Evaluate(String),
    KeyPress(String),
    KeyDown(String),
    KeyUp(String),
    Screenshot(ScreenshotParams),
    ClosePage,
    ClickablePoint(String),
    Click(String, ClickParams),
    Type(String, String, u64),
    Hover(String),
    EvaluateOn(String, String),
    Dispose(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// Time since the page was created.
    pub at: Duration,
    pub call: Call,
}

/// Initial state of a fake DOM element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeElement {
    pub value: Option<String>,
    pub text: String,
    pub visible: bool,
    /// How many clickable-point probes fail before one succeeds.
    pub unclickable_attempts: u32,
}

impl FakeElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn input(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn unclickable_for(mut self, attempts: u32) -> Self {
        self.unclickable_attempts = attempts;
        self
    }
}

#[derive(Debug)]
struct ElementState {
    model: FakeElement,
    caret: usize,
    anchor: Option<usize>,
}

impl ElementState {
    fn chars(&self) -> Vec<char> {
        self.model.value.as_deref().unwrap_or_default().chars().collect()
    }

    fn selection(&self) -> Option<(usize, usize)> {
        let anchor = self.anchor?;
        (anchor != self.caret).then(|| (anchor.min(self.caret), anchor.max(self.caret)))
    }

    fn insert(&mut self, text: &str) {
        if self.model.value.is_none() {
            return;
        }
        let mut chars = self.chars();
        if let Some((start, end)) = self.selection() {
            chars.drain(start..end);
            self.caret = start;
        }
        self.anchor = None;
        let caret = self.caret.min(chars.len());
        let typed: Vec<char> = text.chars().collect();
        chars.splice(caret..caret, typed.iter().copied());
        self.caret = caret + typed.len();
        self.model.value = Some(chars.into_iter().collect());
    }

    fn press(&mut self, key: &str, shift: bool) {
        let len = self.chars().len();
        match key {
            "ArrowRight" | "ArrowLeft" => {
                if shift {
                    self.anchor.get_or_insert(self.caret);
                } else {
                    self.anchor = None;
                }
                self.caret = if key == "ArrowRight" {
                    (self.caret + 1).min(len)
                } else {
                    self.caret.saturating_sub(1)
                };
            }
            "Backspace" => {
                let mut chars = self.chars();
                if let Some((start, end)) = self.selection() {
                    chars.drain(start..end);
                    self.caret = start;
                } else if self.caret > 0 && self.caret <= chars.len() {
                    chars.remove(self.caret - 1);
                    self.caret -= 1;
                }
                self.anchor = None;
                if self.model.value.is_some() {
                    self.model.value = Some(chars.into_iter().collect());
                }
            }
            _ => {}
        }
    }
}

type SharedElement = Arc<Mutex<ElementState>>;

struct PageState {
    started: tokio::time::Instant,
    log: Mutex<Vec<Recorded>>,
    elements: Mutex<Vec<(String, SharedElement)>>,
    focused: Mutex<Option<SharedElement>>,
    shift: AtomicBool,
    default_navigation_timeout: AtomicU64,
    url: Mutex<String>,
    failing_urls: Mutex<HashMap<String, String>>,
    hanging_urls: Mutex<HashSet<String>>,
    window: Mutex<serde_json::Value>,
    closed: AtomicBool,
}

impl PageState {
    fn record(&self, call: Call) {
        lock(&self.log).push(Recorded {
            at: self.started.elapsed(),
            call,
        });
    }

    fn matching(&self, locator: &str) -> Vec<SharedElement> {
        lock(&self.elements)
            .iter()
            .filter(|(key, _)| key == locator)
            .map(|(_, element)| element.clone())
            .collect()
    }

    fn satisfied(&self, locator: &str, options: &WaitOptions) -> bool {
        let first = self.matching(locator).into_iter().next();
        let visible = first.as_ref().map(|e| lock(e).model.visible);
        if options.hidden {
            visible != Some(true)
        } else if options.visible {
            visible == Some(true)
        } else {
            visible.is_some()
        }
    }
}

/// A fake tab. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<PageState>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PageState {
                started: tokio::time::Instant::now(),
                log: Mutex::new(Vec::new()),
                elements: Mutex::new(Vec::new()),
                focused: Mutex::new(None),
                shift: AtomicBool::new(false),
                default_navigation_timeout: AtomicU64::new(30_000),
                url: Mutex::new("about:blank".into()),
                failing_urls: Mutex::new(HashMap::new()),
                hanging_urls: Mutex::new(HashSet::new()),
                window: Mutex::new(serde_json::json!({
                    "width": 1200,
                    "height": 800,
                    "deviceScaleFactor": 1.0
                })),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register an element queried by exactly `locator`. Later additions come after
    /// earlier ones in document order.
    pub fn add(&self, locator: &str, element: FakeElement) -> &Self {
        let len = element.value.as_deref().map(|v| v.chars().count()).unwrap_or(0);
        let state = ElementState {
            model: element,
            caret: len,
            anchor: None,
        };
        lock(&self.state.elements).push((locator.to_string(), Arc::new(Mutex::new(state))));
        self
    }

    pub fn remove(&self, locator: &str) {
        lock(&self.state.elements).retain(|(key, _)| key != locator);
    }

    pub fn set_visible(&self, locator: &str, visible: bool) {
        for element in self.state.matching(locator) {
            lock(&element).model.visible = visible;
        }
    }

    /// Current value of the first element under `locator`.
    pub fn value_of(&self, locator: &str) -> Option<String> {
        let first = self.state.matching(locator).into_iter().next()?;
        let value = lock(&first).model.value.clone();
        value
    }

    /// Navigation to `url` fails with `message`.
    pub fn fail_navigation(&self, url: &str, message: &str) {
        lock(&self.state.failing_urls).insert(url.to_string(), message.to_string());
    }

    /// Navigation to `url` never finishes.
    pub fn hang_navigation(&self, url: &str) {
        lock(&self.state.hanging_urls).insert(url.to_string());
    }

    pub fn set_window(&self, width: u32, height: u32, device_scale_factor: f64) {
        *lock(&self.state.window) = serde_json::json!({
            "width": width,
            "height": height,
            "deviceScaleFactor": device_scale_factor
        });
    }

    pub fn url(&self) -> String {
        lock(&self.state.url).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn default_navigation_timeout(&self) -> u64 {
        self.state.default_navigation_timeout.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        lock(&self.state.log).clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.recorded().into_iter().map(|r| r.call).collect()
    }

    pub fn clear_log(&self) {
        lock(&self.state.log).clear();
    }

    fn handles(&self, locator: &str) -> Vec<ElementHandle> {
        self.state
            .matching(locator)
            .into_iter()
            .map(|element| {
                Box::new(FakeElementHandle {
                    page: self.state.clone(),
                    locator: locator.to_string(),
                    element,
                }) as ElementHandle
            })
            .collect()
    }

    async fn wait(&self, locator: &str, options: &WaitOptions) -> DriverResult<()> {
        poll_until(options.timeout, POLL_INTERVAL, || async {
            Ok(self.state.satisfied(locator, options))
        })
        .await
    }

    fn with_focused(&self, f: impl FnOnce(&mut ElementState)) {
        let focused = lock(&self.state.focused).clone();
        if let Some(element) = focused {
            f(&mut lock(&element));
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str, options: &GotoOptions) -> DriverResult<()> {
        self.state.record(Call::Goto(url.to_string()));
        if let Some(message) = lock(&self.state.failing_urls).get(url).cloned() {
            return Err(DriverError::Other(anyhow!(message)));
        }
        if lock(&self.state.hanging_urls).contains(url) {
            let timeout = options
                .timeout
                .unwrap_or_else(|| self.default_navigation_timeout());
            if timeout == 0 {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(Duration::from_millis(timeout)).await;
            return Err(DriverError::Timeout { timeout });
        }
        *lock(&self.state.url) = url.to_string();
        Ok(())
    }

    async fn wait_for_navigation(&self, _options: &GotoOptions) -> DriverResult<()> {
        self.state.record(Call::WaitForNavigation);
        Ok(())
    }

    fn set_default_navigation_timeout(&self, timeout: u64) {
        self.state.record(Call::SetDefaultNavigationTimeout(timeout));
        self.state
            .default_navigation_timeout
            .store(timeout, Ordering::SeqCst);
    }

    async fn set_viewport(&self, viewport: &Viewport) -> DriverResult<()> {
        self.state.record(Call::SetViewport(*viewport));
        Ok(())
    }

    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        self.state.record(Call::QuerySelectorAll(selector.to_string()));
        Ok(self.handles(selector))
    }

    async fn xpath(&self, expr: &str) -> DriverResult<Vec<ElementHandle>> {
        self.state.record(Call::XPath(expr.to_string()));
        Ok(self.handles(expr))
    }

    async fn wait_for_selector(&self, selector: &str, options: &WaitOptions) -> DriverResult<()> {
        self.state
            .record(Call::WaitForSelector(selector.to_string(), *options));
        self.wait(selector, options).await
    }

    async fn wait_for_xpath(&self, expr: &str, options: &WaitOptions) -> DriverResult<()> {
        self.state.record(Call::WaitForXPath(expr.to_string(), *options));
        self.wait(expr, options).await
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        self.state.record(Call::Evaluate(script.to_string()));
        if script == WINDOW_DIMENSIONS_SCRIPT {
            return Ok(lock(&self.state.window).clone());
        }
        Ok(serde_json::Value::Null)
    }

    async fn key_press(&self, key: &str) -> DriverResult<()> {
        self.state.record(Call::KeyPress(key.to_string()));
        let shift = self.state.shift.load(Ordering::SeqCst);
        self.with_focused(|element| element.press(key, shift));
        Ok(())
    }

    async fn key_down(&self, key: &str) -> DriverResult<()> {
        self.state.record(Call::KeyDown(key.to_string()));
        if key == "Shift" {
            self.state.shift.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn key_up(&self, key: &str) -> DriverResult<()> {
        self.state.record(Call::KeyUp(key.to_string()));
        if key == "Shift" {
            self.state.shift.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn screenshot(&self, params: &ScreenshotParams) -> DriverResult<Vec<u8>> {
        self.state.record(Call::Screenshot(*params));
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&self) -> DriverResult<()> {
        self.state.record(Call::ClosePage);
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeElementHandle {
    page: Arc<PageState>,
    locator: String,
    element: SharedElement,
}

#[async_trait]
impl ElementDriver for FakeElementHandle {
    async fn clickable_point(&self) -> DriverResult<(f64, f64)> {
        self.page.record(Call::ClickablePoint(self.locator.clone()));
        let mut element = lock(&self.element);
        if element.model.unclickable_attempts > 0 {
            element.model.unclickable_attempts -= 1;
            return Err(DriverError::NotClickable(format!(
                "{} is covered by another element",
                self.locator
            )));
        }
        if !element.model.visible {
            return Err(DriverError::NotClickable(format!(
                "{} is not visible",
                self.locator
            )));
        }
        Ok((10.0, 10.0))
    }

    async fn click(&self, params: &ClickParams) -> DriverResult<()> {
        self.page
            .record(Call::Click(self.locator.clone(), *params));
        {
            // A click lands mid-field, not at the end of the text.
            let mut element = lock(&self.element);
            element.caret = element.chars().len() / 2;
            element.anchor = None;
        }
        *lock(&self.page.focused) = Some(self.element.clone());
        Ok(())
    }

    async fn type_text(&self, text: &str, delay: u64) -> DriverResult<()> {
        self.page
            .record(Call::Type(self.locator.clone(), text.to_string(), delay));
        *lock(&self.page.focused) = Some(self.element.clone());
        lock(&self.element).insert(text);
        Ok(())
    }

    async fn hover(&self) -> DriverResult<()> {
        self.page.record(Call::Hover(self.locator.clone()));
        Ok(())
    }

    async fn evaluate(&self, function: &str) -> DriverResult<serde_json::Value> {
        self.page
            .record(Call::EvaluateOn(self.locator.clone(), function.to_string()));
        if function != VALUE_FUNCTION {
            return Ok(serde_json::Value::Null);
        }
        let element = lock(&self.element);
        let value = match element.model.value.as_deref() {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => element.model.text.clone(),
        };
        Ok(serde_json::Value::String(value))
    }

    async fn dispose(&self) -> DriverResult<()> {
        self.page.record(Call::Dispose(self.locator.clone()));
        Ok(())
    }
}

/// A fake browser. Pages queued on the launcher are handed out first.
pub struct FakeBrowser {
    queued: Arc<Mutex<VecDeque<FakePage>>>,
    pages: Mutex<Vec<FakePage>>,
    close_calls: AtomicUsize,
}

impl FakeBrowser {
    pub fn pages(&self) -> Vec<FakePage> {
        lock(&self.pages).clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_page(&self) -> DriverResult<Arc<dyn PageDriver>> {
        if self.close_calls() > 0 {
            return Err(DriverError::Other(anyhow!("browser has been closed")));
        }
        let page = lock(&self.queued).pop_front().unwrap_or_default();
        lock(&self.pages).push(page.clone());
        Ok(Arc::new(page))
    }

    async fn close(&self) -> DriverResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`FakeBrowser`]s and remembers each launch.
#[derive(Default)]
pub struct FakeLauncher {
    queued: Arc<Mutex<VecDeque<FakePage>>>,
    browsers: Mutex<Vec<Arc<FakeBrowser>>>,
    launches: Mutex<Vec<Options>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `new_page` on any browser from this launcher returns `page`.
    pub fn queue_page(&self, page: FakePage) -> &Self {
        lock(&self.queued).push_back(page);
        self
    }

    pub fn browsers(&self) -> Vec<Arc<FakeBrowser>> {
        lock(&self.browsers).clone()
    }

    /// Options passed to every launch so far.
    pub fn launches(&self) -> Vec<Options> {
        lock(&self.launches).clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, options: &Options) -> DriverResult<Arc<dyn BrowserDriver>> {
        lock(&self.launches).push(options.clone());
        let browser = Arc::new(FakeBrowser {
            queued: self.queued.clone(),
            pages: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        });
        lock(&self.browsers).push(browser.clone());
        Ok(browser)
    }
}
