use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;
use url::Url;

use super::options::{Options, Settings};
use crate::driver::{
    BrowserDriver, ElementHandle, GotoOptions, Launcher, PageDriver, Viewport,
    WINDOW_DIMENSIONS_SCRIPT,
};
use crate::error::{Error, Result};
use crate::interaction::{
    self, wait_options, ClickOptions, HoverOptions, Screenshot, ScreenshotOptions, TypeOptions,
};
use crate::selectors::descriptor::normalize;
use crate::selectors::{Locator, PageDescriptor, Params};

/// Page a target starts on unless configured otherwise.
pub const DEFAULT_HOME_PAGE: &str = "HomePage";

/// Where a [`Target`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unopened,
    /// A browser is attached but no tab yet.
    Open,
    PageReady,
    Closed,
}

struct State {
    phase: Phase,
    current_page: String,
    browser: Option<Arc<dyn BrowserDriver>>,
    page: Option<Arc<dyn PageDriver>>,
}

/// A named site under test: its base URL, page descriptors, launch options and,
/// once opened, the browser and tab driving it.
///
/// Element operations take a logical element name, resolved against the
/// current page descriptor, and wait for the element before acting on it.
pub struct Target {
    name: String,
    base_url: Url,
    pages: HashMap<String, PageDescriptor>,
    home_page: String,
    options: Options,
    settings: Settings,
    launcher: Arc<dyn Launcher>,
    span: tracing::Span,
    state: Mutex<State>,
}

pub struct TargetBuilder {
    name: String,
    base_url: String,
    pages: HashMap<String, PageDescriptor>,
    home_page: String,
    options: Options,
    settings: Settings,
    span: Option<tracing::Span>,
}

impl TargetBuilder {
    /// Page descriptors keyed by page name.
    pub fn pages(mut self, pages: HashMap<String, PageDescriptor>) -> Self {
        self.pages = pages
            .into_iter()
            .map(|(name, page)| (normalize(&name), page))
            .collect();
        self
    }

    pub fn page(mut self, descriptor: PageDescriptor) -> Self {
        self.pages.insert(normalize(descriptor.name()), descriptor);
        self
    }

    pub fn home_page(mut self, name: impl Into<String>) -> Self {
        self.home_page = name.into();
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Span the target's operations are logged under.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self, launcher: Arc<dyn Launcher>) -> Result<Target> {
        let base_url = Url::parse(&self.base_url)?;
        let home_page = normalize(&self.home_page);
        if !self.pages.contains_key(&home_page) {
            return Err(Error::HomePageMissing {
                target: self.name,
                home_page: self.home_page,
            });
        }
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("target", name = %self.name));

        Ok(Target {
            name: self.name,
            base_url,
            pages: self.pages,
            home_page: home_page.clone(),
            options: self.options,
            settings: self.settings,
            launcher,
            span,
            state: Mutex::new(State {
                phase: Phase::Unopened,
                current_page: home_page,
                browser: None,
                page: None,
            }),
        })
    }
}

impl Target {
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> TargetBuilder {
        TargetBuilder {
            name: name.into(),
            base_url: base_url.into(),
            pages: HashMap::new(),
            home_page: DEFAULT_HOME_PAGE.into(),
            options: Options::default(),
            settings: Settings::default(),
            span: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn descriptor(&self, page: &str) -> Option<&PageDescriptor> {
        self.pages.get(&normalize(page))
    }

    pub fn page_names(&self) -> impl Iterator<Item = &str> {
        self.pages.values().map(|p| p.name())
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    /// Name of the page descriptor element names resolve against.
    pub async fn current_page(&self) -> String {
        let state = self.state.lock().await;
        self.pages
            .get(&state.current_page)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| state.current_page.clone())
    }

    async fn in_span<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        fut.instrument(self.span.clone()).await
    }

    /// Launch the browser if needed and attach a fresh tab. With
    /// `goto_base_url`, also load the base URL and switch to the home page.
    pub async fn open(&self, goto_base_url: bool) -> Result<()> {
        self.in_span(async {
            let launched = {
                let state = self.state.lock().await;
                state.browser.clone()
            };
            if launched.is_none() {
                tracing::info!("launching browser (headless: {})", self.options.headless());
                let browser = self.launcher.launch(&self.options).await?;
                let mut state = self.state.lock().await;
                state.browser = Some(browser);
                state.phase = Phase::Open;
            }

            self.new_page().await?;

            if goto_base_url {
                let url = self.base_url.to_string();
                self.goto(&url, &GotoOptions::default()).await?;
                self.switch_page(&self.home_page).await?;
            }
            Ok(())
        })
        .await
    }

    /// Open a new tab in the attached browser and make it the target's page.
    ///
    /// The tab is sized to the browser window and gets the configured default
    /// navigation timeout.
    pub async fn new_page(&self) -> Result<Arc<dyn PageDriver>> {
        let browser = {
            let state = self.state.lock().await;
            state.browser.clone().ok_or(Error::BrowserNotOpen)?
        };
        let page = browser.new_page().await?;

        let dimensions = page.evaluate(WINDOW_DIMENSIONS_SCRIPT).await?;
        let viewport = Viewport {
            width: dimension(&dimensions, "width")
                .map(|w| w as u32)
                .unwrap_or(Viewport::default().width),
            height: dimension(&dimensions, "height")
                .map(|h| h as u32)
                .unwrap_or(Viewport::default().height),
            device_scale_factor: dimension(&dimensions, "deviceScaleFactor"),
            ..Default::default()
        };
        tracing::debug!(width = viewport.width, height = viewport.height, "sizing new tab");
        page.set_viewport(&viewport).await?;
        page.set_default_navigation_timeout(self.settings.default_navigation_timeout);

        let mut state = self.state.lock().await;
        state.page = Some(page.clone());
        state.phase = Phase::PageReady;
        Ok(page)
    }

    /// Resolve element names against `page` from now on.
    pub async fn switch_page(&self, page: &str) -> Result<()> {
        let key = normalize(page);
        if !self.pages.contains_key(&key) {
            return Err(Error::PageNotDefined {
                page: page.to_string(),
                target: self.name.clone(),
            });
        }
        tracing::debug!(parent: &self.span, "switching to page [{}]", page);
        self.state.lock().await.current_page = key;
        Ok(())
    }

    /// The attached tab.
    pub async fn page(&self) -> Result<Arc<dyn PageDriver>> {
        let state = self.state.lock().await;
        state.page.clone().ok_or(Error::PageNotReady)
    }

    /// Resolve `element` on the current page into a concrete locator.
    pub async fn locator(&self, element: &str, params: impl Into<Params>) -> Result<Locator> {
        let current = self.state.lock().await.current_page.clone();
        let descriptor = self.pages.get(&current).ok_or_else(|| Error::PageNotDefined {
            page: current.clone(),
            target: self.name.clone(),
        })?;
        descriptor.resolve(element, params)
    }

    /// Navigate to `url`, resolved against the base URL when relative.
    pub async fn goto(&self, url: &str, options: &GotoOptions) -> Result<()> {
        let page = self.page().await?;
        let url = self.base_url.join(url)?;
        self.in_span(async {
            tracing::info!("goto {}", url);
            page.goto(url.as_str(), options).await?;
            Ok(())
        })
        .await
    }

    pub async fn wait_for_navigation(&self, options: &GotoOptions) -> Result<()> {
        let page = self.page().await?;
        page.wait_for_navigation(options).await?;
        Ok(())
    }

    /// Wait for `element` to appear, or to disappear when `hidden` is set.
    pub async fn wait_for_element(
        &self,
        element: &str,
        params: impl Into<Params>,
        hidden: bool,
        timeout: u64,
    ) -> Result<Locator> {
        let locator = self.locator(element, params).await?;
        let page = self.page().await?;
        self.in_span(interaction::wait_for(
            page.as_ref(),
            &locator,
            &wait_options(hidden, timeout),
        ))
        .await?;
        Ok(locator)
    }

    /// First element matching `element`, without waiting.
    pub async fn query(
        &self,
        element: &str,
        params: impl Into<Params>,
    ) -> Result<Option<ElementHandle>> {
        let locator = self.locator(element, params).await?;
        let page = self.page().await?;
        interaction::query(page.as_ref(), &locator).await
    }

    /// Wait for `element` to be visible, then click it. Returns whether the
    /// click was issued.
    pub async fn click(
        &self,
        element: &str,
        params: impl Into<Params>,
        options: &ClickOptions,
    ) -> Result<bool> {
        let locator = self
            .wait_for_element(element, params, false, options.timeout)
            .await?;
        let page = self.page().await?;
        self.in_span(interaction::click(page.as_ref(), &locator, options))
            .await
    }

    /// Wait for `element` to be visible, then type `text` into it.
    pub async fn type_text(
        &self,
        element: &str,
        params: impl Into<Params>,
        text: &str,
        options: &TypeOptions,
    ) -> Result<()> {
        let locator = self
            .wait_for_element(element, params, false, options.timeout)
            .await?;
        let page = self.page().await?;
        self.in_span(interaction::type_text(page.as_ref(), &locator, text, options))
            .await
    }

    pub async fn get_value(
        &self,
        element: &str,
        params: impl Into<Params>,
        timeout: u64,
    ) -> Result<String> {
        let locator = self.wait_for_element(element, params, false, timeout).await?;
        let page = self.page().await?;
        interaction::get_value(page.as_ref(), &locator, true).await
    }

    /// Values of every element matching `element`, in document order.
    pub async fn get_values(
        &self,
        element: &str,
        params: impl Into<Params>,
        timeout: u64,
    ) -> Result<Vec<String>> {
        let locator = self.wait_for_element(element, params, false, timeout).await?;
        let page = self.page().await?;
        interaction::get_values(page.as_ref(), &locator).await
    }

    pub async fn hover(
        &self,
        element: &str,
        params: impl Into<Params>,
        options: &HoverOptions,
    ) -> Result<()> {
        let locator = self
            .wait_for_element(element, params, false, options.timeout)
            .await?;
        let page = self.page().await?;
        interaction::hover(page.as_ref(), &locator, options).await
    }

    pub async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Screenshot> {
        let page = self.page().await?;
        self.in_span(interaction::screenshot(page.as_ref(), options))
            .await
    }

    /// Close the tab and the browser. Closing twice, or closing a target that
    /// was never opened, does nothing.
    pub async fn close(&self) -> Result<()> {
        self.in_span(async {
            let (page, browser) = {
                let mut state = self.state.lock().await;
                if state.phase == Phase::Closed {
                    return Ok(());
                }
                state.phase = Phase::Closed;
                (state.page.take(), state.browser.take())
            };

            if let Some(page) = page {
                if let Err(e) = page.close().await {
                    tracing::debug!("failed to close page: {}", e);
                }
            }
            if let Some(browser) = browser {
                tracing::info!("closing browser");
                browser.close().await?;
            }
            Ok(())
        })
        .await
    }
}

fn dimension(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| v.as_f64()).filter(|v| *v > 0.0)
}
