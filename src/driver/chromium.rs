//! Driver adapter over chromiumoxide (Chrome DevTools Protocol).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton as CdpMouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as CdpClip};
use chromiumoxide::cdp::js_protocol::runtime::ReleaseObjectParams;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::page::{Page, ScreenshotParams as CdpScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;

use super::{
    poll_until, BrowserDriver, ClickParams, DriverError, DriverResult, ElementDriver,
    ElementHandle, GotoOptions, ImageFormat, Launcher, MouseButton, PageDriver,
    ScreenshotParams, Viewport, WaitOptions, WaitUntil,
};
use crate::browser::launcher;
use crate::browser::options::Options;
use crate::selectors::{css, xpath};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches a local Chrome per [`Options`].
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self, options: &Options) -> DriverResult<Arc<dyn BrowserDriver>> {
        let executable = match options.executable_path() {
            Some(path) => path.to_path_buf(),
            None => launcher::find_chrome_binary()?,
        };
        let user_data_dir = tempfile::tempdir().context("Failed to create user data dir")?;

        let mut builder = BrowserConfig::builder()
            .with_head()
            .chrome_executable(executable)
            .user_data_dir(user_data_dir.path())
            .args(launcher::launch_args(options))
            .viewport(options.default_viewport().map(to_cdp_viewport));
        if !options.ignore_https_errors() {
            builder = builder.respect_https_errors();
        }
        let config = builder.build().map_err(|e| anyhow!("{}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // Process browser events
            }
        });

        tracing::info!(
            "Browser launched (headless: {}, slowMo: {}ms)",
            options.headless(),
            options.slow_mo()
        );

        Ok(Arc::new(ChromiumBrowser {
            browser: Mutex::new(Some(browser)),
            handler_task,
            _user_data_dir: user_data_dir,
            slow_mo: Duration::from_secs_f64(options.slow_mo().max(0.0) / 1000.0),
        }))
    }
}

fn to_cdp_viewport(viewport: &Viewport) -> CdpViewport {
    CdpViewport {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: viewport.device_scale_factor,
        emulating_mobile: viewport.is_mobile,
        is_landscape: viewport.is_landscape,
        has_touch: viewport.has_touch,
    }
}

pub struct ChromiumBrowser {
    browser: Mutex<Option<Browser>>,
    handler_task: tokio::task::JoinHandle<()>,
    _user_data_dir: tempfile::TempDir,
    slow_mo: Duration,
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    async fn new_page(&self) -> DriverResult<Arc<dyn PageDriver>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Browser is already closed"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;
        Ok(Arc::new(ChromiumPage::new(page, self.slow_mo)))
    }

    async fn close(&self) -> DriverResult<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser.close().await.context("Failed to close browser")?;
            let _ = browser.wait().await;
            self.handler_task.abort();
            tracing::info!("Browser closed");
        }
        Ok(())
    }
}

/// CDP modifier bits, as carried on key and mouse events.
fn modifier_bit(key: &str) -> i64 {
    match key {
        "Alt" => 1,
        "Control" => 2,
        "Meta" => 4,
        "Shift" => 8,
        _ => 0,
    }
}

/// (code, text, virtual key code) for a named key.
fn key_definition(key: &str) -> (String, Option<String>, Option<i64>) {
    match key {
        "Enter" => ("Enter".into(), Some("\r".into()), Some(13)),
        "Tab" => ("Tab".into(), Some("\t".into()), Some(9)),
        "Escape" => ("Escape".into(), None, Some(27)),
        "Backspace" => ("Backspace".into(), None, Some(8)),
        "Delete" => ("Delete".into(), None, Some(46)),
        "ArrowUp" => ("ArrowUp".into(), None, Some(38)),
        "ArrowDown" => ("ArrowDown".into(), None, Some(40)),
        "ArrowLeft" => ("ArrowLeft".into(), None, Some(37)),
        "ArrowRight" => ("ArrowRight".into(), None, Some(39)),
        "Home" => ("Home".into(), None, Some(36)),
        "End" => ("End".into(), None, Some(35)),
        "Shift" => ("ShiftLeft".into(), None, Some(16)),
        "Control" => ("ControlLeft".into(), None, Some(17)),
        "Alt" => ("AltLeft".into(), None, Some(18)),
        "Meta" => ("MetaLeft".into(), None, Some(91)),
        "Space" | " " => ("Space".into(), Some(" ".into()), Some(32)),
        other => {
            let upper = other.to_uppercase();
            let code = upper.chars().next().map(|c| c as i64);
            (format!("Key{}", upper), Some(other.to_string()), code)
        }
    }
}

/// Declares `visible(el)`; hidden is its exact negation.
const VISIBLE_JS: &str = r#"const visible = (el) => {
                        const style = getComputedStyle(el);
                        const rect = el.getBoundingClientRect();
                        return style.visibility !== 'hidden'
                            && style.display !== 'none'
                            && rect.width > 0
                            && rect.height > 0;
                    };"#;

/// Polling predicate for a wait on `element_js`.
fn wait_check_js(element_js: &str, options: &WaitOptions) -> String {
    if options.hidden || options.visible {
        format!(
            r#"(() => {{
                    const el = {element_js};
                    const wanted = {visible};
                    if (!el) return !wanted;
                    {VISIBLE_JS}
                    return visible(el) === wanted;
                }})()"#,
            visible = !options.hidden,
        )
    } else {
        format!("(() => !!({element_js}))()")
    }
}

pub struct ChromiumPage {
    page: Page,
    slow_mo: Duration,
    default_navigation_timeout: AtomicU64,
    modifiers: AtomicI64,
}

impl ChromiumPage {
    fn new(page: Page, slow_mo: Duration) -> Self {
        Self {
            page,
            slow_mo,
            default_navigation_timeout: AtomicU64::new(30_000),
            modifiers: AtomicI64::new(0),
        }
    }

    async fn slow(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    fn navigation_timeout(&self, options: &GotoOptions) -> u64 {
        options
            .timeout
            .unwrap_or_else(|| self.default_navigation_timeout.load(Ordering::Relaxed))
    }

    async fn settle(&self, wait_until: WaitUntil) {
        // goto() already waits for the load event; idle states get extra settle time.
        match wait_until {
            WaitUntil::NetworkIdle0 | WaitUntil::NetworkIdle2 => {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            WaitUntil::Load | WaitUntil::DomContentLoaded => {}
        }
    }

    async fn with_timeout<F, T>(&self, timeout: u64, fut: F) -> DriverResult<T>
    where
        F: std::future::Future<Output = DriverResult<T>>,
    {
        if timeout == 0 {
            return fut.await;
        }
        tokio::time::timeout(Duration::from_millis(timeout), fut)
            .await
            .map_err(|_| DriverError::Timeout { timeout })?
    }

    async fn wait_for_element_js(&self, element_js: &str, options: &WaitOptions) -> DriverResult<()> {
        let check_js = wait_check_js(element_js, options);

        poll_until(options.timeout, POLL_INTERVAL, || {
            let check_js = check_js.as_str();
            async move {
                Ok(match self.page.evaluate(check_js).await {
                    Ok(result) => result.into_value::<bool>().unwrap_or(false),
                    Err(_) => false,
                })
            }
        })
        .await
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &str) -> DriverResult<()> {
        let (code, text, virtual_key) = key_definition(key);
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key.to_string())
            .code(code)
            .modifiers(self.modifiers.load(Ordering::SeqCst));
        if let Some(vk) = virtual_key {
            builder = builder
                .windows_virtual_key_code(vk)
                .native_virtual_key_code(vk);
        }
        if matches!(kind, DispatchKeyEventType::KeyDown) {
            if let Some(text) = text {
                builder = builder.text(text);
            }
        }
        let params = builder.build().map_err(|e| anyhow!("{}", e))?;
        self.page
            .execute(params)
            .await
            .with_context(|| format!("Failed to dispatch key {}", key))?;
        Ok(())
    }

    fn wrap(&self, element: Element, label: &str) -> ElementHandle {
        Box::new(ChromiumElement {
            element,
            page: self.page.clone(),
            label: label.to_string(),
            slow_mo: self.slow_mo,
        })
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, options: &GotoOptions) -> DriverResult<()> {
        self.slow().await;
        tracing::info!("Navigating to: {}", url);
        let timeout = self.navigation_timeout(options);
        self.with_timeout(timeout, async {
            self.page
                .goto(url)
                .await
                .with_context(|| format!("Failed to navigate to {}", url))?;
            Ok(())
        })
        .await?;
        self.settle(options.wait_until).await;
        Ok(())
    }

    async fn wait_for_navigation(&self, options: &GotoOptions) -> DriverResult<()> {
        let timeout = self.navigation_timeout(options);
        self.with_timeout(timeout, async {
            self.page
                .wait_for_navigation()
                .await
                .context("Failed waiting for navigation")?;
            Ok(())
        })
        .await?;
        self.settle(options.wait_until).await;
        Ok(())
    }

    fn set_default_navigation_timeout(&self, timeout: u64) {
        self.default_navigation_timeout.store(timeout, Ordering::Relaxed);
    }

    async fn set_viewport(&self, viewport: &Viewport) -> DriverResult<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(viewport.device_scale_factor.unwrap_or(1.0))
            .mobile(viewport.is_mobile)
            .build()
            .map_err(|e| anyhow!("{}", e))?;
        self.page
            .execute(params)
            .await
            .context("Failed to set viewport")?;
        Ok(())
    }

    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("Failed to query selector {}", selector))?;
        Ok(elements.into_iter().map(|e| self.wrap(e, selector)).collect())
    }

    async fn xpath(&self, expr: &str) -> DriverResult<Vec<ElementHandle>> {
        let elements = self
            .page
            .find_xpaths(expr)
            .await
            .with_context(|| format!("Failed to evaluate XPath {}", expr))?;
        Ok(elements.into_iter().map(|e| self.wrap(e, expr)).collect())
    }

    async fn wait_for_selector(&self, selector: &str, options: &WaitOptions) -> DriverResult<()> {
        self.wait_for_element_js(&css::first_element_js(selector), options)
            .await
    }

    async fn wait_for_xpath(&self, expr: &str, options: &WaitOptions) -> DriverResult<()> {
        self.wait_for_element_js(&xpath::first_element_js(expr), options)
            .await
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("Failed to evaluate script")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn key_press(&self, key: &str) -> DriverResult<()> {
        self.slow().await;
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn key_down(&self, key: &str) -> DriverResult<()> {
        self.slow().await;
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.modifiers.fetch_or(modifier_bit(key), Ordering::SeqCst);
        Ok(())
    }

    async fn key_up(&self, key: &str) -> DriverResult<()> {
        self.slow().await;
        self.modifiers.fetch_and(!modifier_bit(key), Ordering::SeqCst);
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn screenshot(&self, params: &ScreenshotParams) -> DriverResult<Vec<u8>> {
        let format = match params.format {
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };
        let mut builder = CdpScreenshotParams::builder()
            .format(format)
            .full_page(params.full_page)
            .omit_background(params.omit_background);
        if let Some(quality) = params.quality {
            builder = builder.quality(quality as i64);
        }
        if let Some(clip) = params.clip {
            builder = builder.clip(CdpClip {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            });
        }
        let bytes = self
            .page
            .screenshot(builder.build())
            .await
            .context("Failed to take screenshot")?;
        Ok(bytes)
    }

    async fn close(&self) -> DriverResult<()> {
        self.page
            .clone()
            .close()
            .await
            .context("Failed to close page")?;
        Ok(())
    }
}

pub struct ChromiumElement {
    element: Element,
    page: Page,
    label: String,
    slow_mo: Duration,
}

impl ChromiumElement {
    async fn slow(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        (x, y): (f64, f64),
        params: &ClickParams,
    ) -> DriverResult<()> {
        let button = match params.button {
            MouseButton::Left => CdpMouseButton::Left,
            MouseButton::Right => CdpMouseButton::Right,
            MouseButton::Middle => CdpMouseButton::Middle,
        };
        let event = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(button)
            .click_count(params.click_count as i64)
            .build()
            .map_err(|e| anyhow!("{}", e))?;
        self.page
            .execute(event)
            .await
            .context("Failed to dispatch mouse event")?;
        Ok(())
    }
}

#[async_trait]
impl ElementDriver for ChromiumElement {
    async fn clickable_point(&self) -> DriverResult<(f64, f64)> {
        let _ = self.element.scroll_into_view().await;
        let point = self
            .element
            .clickable_point()
            .await
            .map_err(|e| DriverError::NotClickable(format!("{}: {}", self.label, e)))?;
        Ok((point.x, point.y))
    }

    async fn click(&self, params: &ClickParams) -> DriverResult<()> {
        self.slow().await;
        let point = self.clickable_point().await?;
        self.mouse(DispatchMouseEventType::MouseMoved, point, params)
            .await?;
        self.mouse(DispatchMouseEventType::MousePressed, point, params)
            .await?;
        if params.delay > 0 {
            tokio::time::sleep(Duration::from_millis(params.delay)).await;
        }
        self.mouse(DispatchMouseEventType::MouseReleased, point, params)
            .await
    }

    async fn type_text(&self, text: &str, delay: u64) -> DriverResult<()> {
        self.slow().await;
        self.element
            .focus()
            .await
            .with_context(|| format!("Failed to focus {}", self.label))?;
        if delay == 0 {
            self.element
                .type_str(text)
                .await
                .context("Failed to type text")?;
            return Ok(());
        }
        for c in text.chars() {
            self.element
                .type_str(c.to_string())
                .await
                .context("Failed to type text")?;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    async fn hover(&self) -> DriverResult<()> {
        self.slow().await;
        self.element
            .hover()
            .await
            .with_context(|| format!("Failed to hover {}", self.label))?;
        Ok(())
    }

    async fn evaluate(&self, function: &str) -> DriverResult<serde_json::Value> {
        let declaration = format!("function() {{ return ({})(this); }}", function);
        let returns = self
            .element
            .call_js_fn(declaration, true)
            .await
            .context("Failed to evaluate on element")?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }

    async fn dispose(&self) -> DriverResult<()> {
        self.page
            .execute(ReleaseObjectParams::new(self.element.remote_object_id.clone()))
            .await
            .context("Failed to release element handle")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_check_negates_visible_check() {
        let element = css::first_element_js("#spinner");
        let visible = wait_check_js(&element, &WaitOptions::default());
        let hidden = wait_check_js(
            &element,
            &WaitOptions {
                visible: false,
                hidden: true,
                timeout: 1000,
            },
        );

        // Same predicate, only the wanted outcome differs; a zero-size box
        // therefore counts as hidden.
        assert!(visible.contains("rect.width > 0"));
        assert!(visible.contains("const wanted = true;"));
        assert_eq!(
            hidden,
            visible.replace("const wanted = true;", "const wanted = false;")
        );
    }

    #[test]
    fn test_attached_check_only_tests_presence() {
        let element = css::first_element_js("#kw");
        let attached = wait_check_js(
            &element,
            &WaitOptions {
                visible: false,
                hidden: false,
                timeout: 0,
            },
        );
        assert_eq!(attached, format!("(() => !!({element}))()"));
    }
}
