use std::time::Duration;

use crate::driver::PageDriver;
use crate::error::Result;
use crate::selectors::Locator;

use super::value::{release, require};
use super::DEFAULT_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverOptions {
    /// Milliseconds to stay over the element.
    pub delay: u64,
    pub timeout: u64,
    pub dispose: bool,
}

impl Default for HoverOptions {
    fn default() -> Self {
        Self {
            delay: 0,
            timeout: DEFAULT_TIMEOUT,
            dispose: true,
        }
    }
}

/// Move the mouse over the first element matching `locator`.
pub async fn hover(page: &dyn PageDriver, locator: &Locator, options: &HoverOptions) -> Result<()> {
    let element = require(page, locator).await?;
    element.hover().await?;
    if options.delay > 0 {
        tokio::time::sleep(Duration::from_millis(options.delay)).await;
    }
    if options.dispose {
        release(element.as_ref()).await;
    }
    Ok(())
}
