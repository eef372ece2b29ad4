use std::time::Duration;

use crate::driver::{ClickParams, ElementDriver, MouseButton, PageDriver};
use crate::error::{Error, Result};
use crate::selectors::Locator;

use super::value::{release, require};
use super::DEFAULT_TIMEOUT;

/// Clickable-point probes made before giving up on an element.
pub const CLICKABLE_ATTEMPTS: u32 = 10;
/// Pause between two clickable-point probes.
pub const CLICKABLE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub click_count: u32,
    /// Milliseconds between mousedown and mouseup.
    pub delay: u64,
    /// Wait timeout in ms, used by callers that wait before clicking.
    pub timeout: u64,
    pub dispose: bool,
    /// Fail with [`Error::ElementNotClickable`] instead of skipping the click
    /// when the element never becomes clickable.
    pub strict: bool,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
            delay: 0,
            timeout: DEFAULT_TIMEOUT,
            dispose: true,
            strict: false,
        }
    }
}

impl ClickOptions {
    fn params(&self) -> ClickParams {
        ClickParams {
            button: self.button,
            click_count: self.click_count,
            delay: self.delay,
        }
    }
}

/// Probe for a clickable point until one is found or the attempts run out.
async fn wait_until_clickable(element: &dyn ElementDriver, locator: &Locator) -> bool {
    for attempt in 1..=CLICKABLE_ATTEMPTS {
        match element.clickable_point().await {
            Ok(_) => return true,
            Err(e) => {
                tracing::debug!(%locator, attempt, "element not clickable yet: {}", e);
                if attempt < CLICKABLE_ATTEMPTS {
                    tokio::time::sleep(CLICKABLE_BACKOFF).await;
                }
            }
        }
    }
    false
}

/// Click an element already in hand. Returns whether the click was issued.
///
/// An element that never gets a clickable point is skipped with a warning,
/// or rejected when `options.strict` is set.
pub async fn click_element(
    element: &dyn ElementDriver,
    locator: &Locator,
    options: &ClickOptions,
) -> Result<bool> {
    if !wait_until_clickable(element, locator).await {
        if options.strict {
            return Err(Error::ElementNotClickable {
                locator: locator.content().to_string(),
                attempts: CLICKABLE_ATTEMPTS,
            });
        }
        tracing::warn!(
            %locator,
            "element has no clickable point after {} attempts, click skipped",
            CLICKABLE_ATTEMPTS
        );
        return Ok(false);
    }
    element.click(&options.params()).await?;
    Ok(true)
}

/// Click the first element matching `locator`.
pub async fn click(page: &dyn PageDriver, locator: &Locator, options: &ClickOptions) -> Result<bool> {
    let element = require(page, locator).await?;
    let clicked = click_element(element.as_ref(), locator, options).await;
    if options.dispose {
        release(element.as_ref()).await;
    }
    clicked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{Call, FakeElement, FakePage};

    #[tokio::test(start_paused = true)]
    async fn test_guard_retries_then_clicks() {
        let page = FakePage::new();
        page.add("#go", FakeElement::text("Go").unclickable_for(3));
        let locator = Locator::new("#go").unwrap();
        let start = tokio::time::Instant::now();

        assert!(click(&page, &locator, &ClickOptions::default()).await.unwrap());
        assert_eq!(start.elapsed(), CLICKABLE_BACKOFF * 3);
        let calls = page.calls();
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::ClickablePoint(_))).count(),
            4
        );
        assert!(calls.contains(&Call::Click("#go".into(), ClickParams::default())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_exhaustion_skips_click() {
        let page = FakePage::new();
        page.add("#go", FakeElement::text("Go").unclickable_for(100));
        let locator = Locator::new("#go").unwrap();

        assert!(!click(&page, &locator, &ClickOptions::default()).await.unwrap());
        let calls = page.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Click(..))));
        assert_eq!(calls.last(), Some(&Call::Dispose("#go".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_exhaustion_strict() {
        let page = FakePage::new();
        page.add("#go", FakeElement::text("Go").unclickable_for(100));
        let locator = Locator::new("#go").unwrap();
        let options = ClickOptions {
            strict: true,
            ..Default::default()
        };
        let start = tokio::time::Instant::now();

        let err = click(&page, &locator, &options).await.unwrap_err();
        assert!(matches!(err, Error::ElementNotClickable { attempts: 10, .. }));
        assert_eq!(start.elapsed(), CLICKABLE_BACKOFF * 9);
    }

    #[tokio::test]
    async fn test_right_double_click() {
        let page = FakePage::new();
        page.add("td", FakeElement::text("cell"));
        let locator = Locator::new("td").unwrap();
        let options = ClickOptions {
            button: MouseButton::Right,
            click_count: 2,
            delay: 0,
            dispose: false,
            ..Default::default()
        };
        click(&page, &locator, &options).await.unwrap();
        let calls = page.calls();
        assert!(calls.contains(&Call::Click(
            "td".into(),
            ClickParams {
                button: MouseButton::Right,
                click_count: 2,
                delay: 0
            }
        )));
        assert!(!calls.iter().any(|c| matches!(c, Call::Dispose(_))));
    }
}
