use sxd_xpath::Factory;

/// Whether `expr` compiles as an XPath 1.0 expression.
pub fn is_valid(expr: &str) -> bool {
    !expr.trim().is_empty() && Factory::new().build(expr).is_ok()
}

/// JS expression resolving to the first node matching an XPath, or null.
pub fn first_element_js(expr: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        serde_json::to_string(expr).unwrap_or_default()
    )
}
