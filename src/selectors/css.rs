use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, StyleSheet};

/// Whether `selector` parses under the CSS selector grammar.
///
/// Pseudo-classes and pseudo-elements are checked for syntax only, so
/// `:hover` or `::before` are as valid as `:nth-child(2)`.
pub fn is_valid(selector: &str) -> bool {
    if selector.trim().is_empty() {
        return false;
    }
    // Parse as the prelude of an empty style rule; anything that escapes the
    // prelude shows up as extra rules or declarations.
    let sheet = format!("{selector} {{}}");
    let Ok(parsed) = StyleSheet::parse(&sheet, ParserOptions::default()) else {
        return false;
    };
    match parsed.rules.0.as_slice() {
        [CssRule::Style(rule)] => {
            rule.rules.0.is_empty()
                && rule.declarations.declarations.is_empty()
                && rule.declarations.important_declarations.is_empty()
        }
        _ => false,
    }
}

/// JS expression resolving to the first element matching a CSS selector, or null.
pub fn first_element_js(selector: &str) -> String {
    format!(
        "document.querySelector({})",
        serde_json::to_string(selector).unwrap_or_default()
    )
}
