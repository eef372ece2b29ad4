use crate::driver::{DriverError, PageDriver, WaitOptions};
use crate::error::{Error, Result, WaitAction};
use crate::selectors::{Locator, LocatorKind};

/// Wait options for an element that should appear (`hidden == false`) or
/// disappear (`hidden == true`).
pub fn wait_options(hidden: bool, timeout: u64) -> WaitOptions {
    WaitOptions {
        visible: !hidden,
        hidden,
        timeout,
    }
}

/// Wait until `locator` is visible, or hidden when `options.hidden` is set.
///
/// A driver timeout becomes [`Error::ElementTimeout`]; any other driver error
/// is returned as is.
pub async fn wait_for(page: &dyn PageDriver, locator: &Locator, options: &WaitOptions) -> Result<()> {
    tracing::debug!(%locator, timeout = options.timeout, hidden = options.hidden, "wait for element");
    let waited = match locator.kind() {
        LocatorKind::Css => page.wait_for_selector(locator.content(), options).await,
        LocatorKind::Xpath => page.wait_for_xpath(locator.content(), options).await,
    };
    match waited {
        Ok(()) => Ok(()),
        Err(DriverError::Timeout { .. }) => Err(Error::ElementTimeout {
            locator: locator.content().to_string(),
            timeout: options.timeout,
            action: if options.hidden {
                WaitAction::Disappear
            } else {
                WaitAction::Appear
            },
        }),
        Err(e) => Err(e.into()),
    }
}
