//! The capability surface the engine needs from a browser automation driver.
//!
//! [`chromium`] adapts chromiumoxide to it; [`fake`] is an in-memory stand-in
//! that records every call, used by the test suites.

pub mod chromium;
pub mod fake;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::options::Options;

/// Script run against an element handle to read its current value.
pub const VALUE_FUNCTION: &str = "node => node.value || node.innerText";

/// Script run against a fresh page to learn the window's outer dimensions.
pub const WINDOW_DIMENSIONS_SCRIPT: &str = r#"(() => ({
    width: window.outerWidth,
    height: window.outerHeight,
    deviceScaleFactor: window.devicePixelRatio
}))()"#;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors reported by a driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timeout {timeout}ms exceeded")]
    Timeout { timeout: u64 },

    #[error("element is not clickable: {0}")]
    NotClickable(String),

    #[error("no Chrome or Chromium found, set executablePath (searched: {})", join_paths(.searched))]
    BrowserNotFound { searched: Vec<PathBuf> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl std::str::FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            other => Err(format!("unknown mouse button {other:?}")),
        }
    }
}

/// Mouse parameters for a single element click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickParams {
    pub button: MouseButton,
    pub click_count: u32,
    /// Milliseconds between mousedown and mouseup.
    pub delay: u64,
}

impl Default for ClickParams {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
            delay: 0,
        }
    }
}

/// Options for the selector/xpath wait primitives. A `timeout` of 0 waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub visible: bool,
    pub hidden: bool,
    pub timeout: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            visible: true,
            hidden: false,
            timeout: 30_000,
        }
    }
}

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle0,
    NetworkIdle2,
}

impl std::str::FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle0" => Ok(Self::NetworkIdle0),
            "networkidle2" => Ok(Self::NetworkIdle2),
            other => Err(format!("unknown wait_until event {other:?}")),
        }
    }
}

/// Navigation options. `timeout: None` falls back to the page's default
/// navigation timeout; `Some(0)` disables the timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GotoOptions {
    pub timeout: Option<u64>,
    pub wait_until: WaitUntil,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub has_touch: bool,
    #[serde(default)]
    pub is_landscape: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            device_scale_factor: None,
            is_mobile: false,
            has_touch: false,
            is_landscape: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Infer the format from a file extension, png when unknown.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => Self::Jpeg,
            _ => Self::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What the driver's screenshot primitive captures.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenshotParams {
    pub format: ImageFormat,
    pub quality: Option<u32>,
    pub full_page: bool,
    pub clip: Option<Clip>,
    pub omit_background: bool,
}

pub type ElementHandle = Box<dyn ElementDriver>;

/// Launches browsers from validated [`Options`].
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, options: &Options) -> DriverResult<Arc<dyn BrowserDriver>>;
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self) -> DriverResult<Arc<dyn PageDriver>>;
    async fn close(&self) -> DriverResult<()>;
}

/// A single tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str, options: &GotoOptions) -> DriverResult<()>;
    async fn wait_for_navigation(&self, options: &GotoOptions) -> DriverResult<()>;
    fn set_default_navigation_timeout(&self, timeout: u64);
    async fn set_viewport(&self, viewport: &Viewport) -> DriverResult<()>;

    async fn query_selector_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>>;
    /// Every element matching `expr`, in document order.
    async fn xpath(&self, expr: &str) -> DriverResult<Vec<ElementHandle>>;
    async fn wait_for_selector(&self, selector: &str, options: &WaitOptions) -> DriverResult<()>;
    async fn wait_for_xpath(&self, expr: &str, options: &WaitOptions) -> DriverResult<()>;

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;

    async fn key_press(&self, key: &str) -> DriverResult<()>;
    async fn key_down(&self, key: &str) -> DriverResult<()>;
    async fn key_up(&self, key: &str) -> DriverResult<()>;

    async fn screenshot(&self, params: &ScreenshotParams) -> DriverResult<Vec<u8>>;
    async fn close(&self) -> DriverResult<()>;
}

/// A live reference to one DOM element. Must be disposed once no longer needed.
#[async_trait]
pub trait ElementDriver: Send + Sync {
    /// A viewport point that would hit this element, or an error when it is
    /// hidden, obscured, detached or zero-sized.
    async fn clickable_point(&self) -> DriverResult<(f64, f64)>;
    async fn click(&self, params: &ClickParams) -> DriverResult<()>;
    /// Type `text` one character at a time, `delay` ms between keys.
    async fn type_text(&self, text: &str, delay: u64) -> DriverResult<()>;
    async fn hover(&self) -> DriverResult<()>;
    /// Call `function` with the element as its only argument.
    async fn evaluate(&self, function: &str) -> DriverResult<serde_json::Value>;
    async fn dispose(&self) -> DriverResult<()>;
}

/// Poll `check` every `interval` until it reports true or `timeout` ms pass.
/// A `timeout` of 0 polls forever.
pub async fn poll_until<F, Fut>(timeout: u64, interval: Duration, mut check: F) -> DriverResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<bool>>,
{
    let deadline =
        (timeout > 0).then(|| tokio::time::Instant::now() + Duration::from_millis(timeout));
    loop {
        if check().await? {
            return Ok(());
        }
        if let Some(deadline) = deadline {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout { timeout });
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        } else {
            tokio::time::sleep(interval).await;
        }
    }
}
