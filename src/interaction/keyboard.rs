use std::time::Duration;

use crate::driver::{ElementDriver, PageDriver};
use crate::error::Result;
use crate::selectors::Locator;

use super::click::{click_element, ClickOptions};
use super::value::{read_raw_value, release, require};
use super::DEFAULT_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeOptions {
    /// Milliseconds between key presses.
    pub delay: u64,
    /// Erase the current content before typing.
    pub clear: bool,
    /// Wait timeout in ms, used by callers that wait before typing.
    pub timeout: u64,
    pub dispose: bool,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            delay: 0,
            clear: false,
            timeout: DEFAULT_TIMEOUT,
            dispose: true,
        }
    }
}

/// Select and delete an element's current content with the keyboard.
///
/// Click into the field, move the caret to the end, shift-select back to the
/// start one key at a time (sleeping `delay` ms after each key) and press
/// Backspace. An empty field is left alone.
pub async fn erase(
    page: &dyn PageDriver,
    element: &dyn ElementDriver,
    locator: &Locator,
    delay: u64,
) -> Result<()> {
    let length = read_raw_value(element).await?.chars().count();
    if length == 0 {
        return Ok(());
    }
    tracing::debug!(%locator, length, "erasing element content");

    let focus = ClickOptions {
        dispose: false,
        ..Default::default()
    };
    click_element(element, locator, &focus).await?;

    for _ in 0..length {
        page.key_press("ArrowRight").await?;
    }
    page.key_down("Shift").await?;
    for _ in 0..length {
        page.key_press("ArrowLeft").await?;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
    page.key_up("Shift").await?;
    page.key_press("Backspace").await?;
    Ok(())
}

/// Type `text` into an element already in hand.
pub async fn type_into(
    page: &dyn PageDriver,
    element: &dyn ElementDriver,
    locator: &Locator,
    text: &str,
    options: &TypeOptions,
) -> Result<()> {
    if options.clear {
        erase(page, element, locator, options.delay).await?;
    }
    tracing::debug!(%locator, delay = options.delay, "typing {} chars", text.chars().count());
    element.type_text(text, options.delay).await?;
    Ok(())
}

/// Type `text` into the first element matching `locator`.
pub async fn type_text(
    page: &dyn PageDriver,
    locator: &Locator,
    text: &str,
    options: &TypeOptions,
) -> Result<()> {
    let element = require(page, locator).await?;
    let typed = type_into(page, element.as_ref(), locator, text, options).await;
    if options.dispose {
        release(element.as_ref()).await;
    }
    typed
}
