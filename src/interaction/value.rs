use futures::future::{join_all, try_join_all};

use crate::driver::{ElementDriver, ElementHandle, PageDriver, VALUE_FUNCTION};
use crate::error::{Error, Result};
use crate::selectors::{Locator, LocatorKind};

/// First element matching `locator`, if any.
///
/// Only the first match is handed out; every other handle is released from
/// the driver's table before returning.
pub async fn query(page: &dyn PageDriver, locator: &Locator) -> Result<Option<ElementHandle>> {
    let mut matches = query_all(page, locator).await?.into_iter();
    let first = matches.next();
    join_all(matches.map(|rest| async move { release(rest.as_ref()).await })).await;
    Ok(first)
}

/// Every element matching `locator`, in document order.
pub async fn query_all(page: &dyn PageDriver, locator: &Locator) -> Result<Vec<ElementHandle>> {
    Ok(match locator.kind() {
        LocatorKind::Css => page.query_selector_all(locator.content()).await?,
        LocatorKind::Xpath => page.xpath(locator.content()).await?,
    })
}

/// Like [`query`], but a missing element is an error.
pub async fn require(page: &dyn PageDriver, locator: &Locator) -> Result<ElementHandle> {
    query(page, locator).await?.ok_or_else(|| Error::ElementNotExist {
        locator: locator.content().to_string(),
    })
}

/// Dispose an element handle. Failures are logged, not returned: the handle
/// is gone either way once its page navigates.
pub async fn release(element: &dyn ElementDriver) {
    if let Err(e) = element.dispose().await {
        tracing::debug!("failed to dispose element handle: {}", e);
    }
}

/// The element's `value`, or its text when it has none, as the page holds it.
pub async fn read_raw_value(element: &dyn ElementDriver) -> Result<String> {
    let value = element.evaluate(VALUE_FUNCTION).await?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// [`read_raw_value`], trimmed.
pub async fn read_value(element: &dyn ElementDriver) -> Result<String> {
    Ok(read_raw_value(element).await?.trim().to_string())
}

/// Value of the first element matching `locator`.
pub async fn get_value(page: &dyn PageDriver, locator: &Locator, dispose: bool) -> Result<String> {
    let element = require(page, locator).await?;
    let value = read_value(element.as_ref()).await;
    if dispose {
        release(element.as_ref()).await;
    }
    value
}

/// Values of every element matching `locator`, read concurrently and
/// returned in document order.
pub async fn get_values(page: &dyn PageDriver, locator: &Locator) -> Result<Vec<String>> {
    let elements = query_all(page, locator).await?;
    tracing::debug!(%locator, count = elements.len(), "reading element values");
    let values = try_join_all(elements.iter().map(|e| read_value(e.as_ref()))).await;
    join_all(elements.iter().map(|e| release(e.as_ref()))).await;
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{Call, FakeElement, FakePage};

    #[tokio::test]
    async fn test_get_value_prefers_value_and_trims() {
        let page = FakePage::new();
        page.add("#kw", FakeElement::input("  rust  "));
        page.add("h1", FakeElement::text("\n Title \n"));

        let kw = Locator::new("#kw").unwrap();
        assert_eq!(get_value(&page, &kw, true).await.unwrap(), "rust");
        let h1 = Locator::new("h1").unwrap();
        assert_eq!(get_value(&page, &h1, true).await.unwrap(), "Title");
        assert_eq!(
            page.calls().iter().filter(|c| matches!(c, Call::Dispose(_))).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_element() {
        let page = FakePage::new();
        let locator = Locator::new("#nothing").unwrap();
        assert!(matches!(
            get_value(&page, &locator, true).await,
            Err(Error::ElementNotExist { locator }) if locator == "#nothing"
        ));
    }

    #[tokio::test]
    async fn test_css_query_releases_extra_matches() {
        let page = FakePage::new();
        page.add("li.item", FakeElement::text("one"));
        page.add("li.item", FakeElement::text("two"));
        page.add("li.item", FakeElement::text("three"));
        let locator = Locator::new("li.item").unwrap();

        let first = query(&page, &locator).await.unwrap().unwrap();
        assert_eq!(read_value(first.as_ref()).await.unwrap(), "one");
        assert_eq!(
            page.calls()
                .iter()
                .filter(|c| **c == Call::Dispose("li.item".into()))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_xpath_query_keeps_first_match() {
        let page = FakePage::new();
        page.add("//li", FakeElement::text("one"));
        page.add("//li", FakeElement::text("two"));
        let locator = Locator::new("//li").unwrap();
        let first = query(&page, &locator).await.unwrap().unwrap();
        assert_eq!(read_value(first.as_ref()).await.unwrap(), "one");
        assert!(page.calls().contains(&Call::Dispose("//li".into())));
    }
}
