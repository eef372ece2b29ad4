pub mod css;
pub mod descriptor;
pub mod template;
pub mod xpath;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
pub use descriptor::{resolve, PageDescriptor};
pub use template::Params;

/// Value substituted for template markers while checking the grammar.
const NEUTRAL_PARAMETER: &str = "1";

/// The selector language a locator is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    Xpath,
}

impl std::fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css => f.write_str("css"),
            Self::Xpath => f.write_str("xpath"),
        }
    }
}

/// A CSS selector or XPath expression, classified once on construction.
///
/// `content` may still hold `{}` markers; [`Locator::fill`] produces the
/// concrete locator and keeps the kind computed for the template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Locator {
    kind: LocatorKind,
    content: String,
}

impl Locator {
    /// Classify `content` and build a locator from it.
    pub fn new(content: impl Into<String>) -> Result<Self> {
        let (kind, content) = classify(&content.into())?;
        Ok(Self { kind, content })
    }

    /// Build a locator from a loosely typed config value; only strings are accepted.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let (kind, content) = classify_value(value)?;
        Ok(Self { kind, content })
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_template(&self) -> bool {
        template::has_placeholders(&self.content)
    }

    /// Fill template markers with `params`. The kind is carried over, not recomputed.
    pub fn fill(&self, params: &Params) -> Result<Self> {
        if !self.is_template() {
            return Ok(self.clone());
        }
        Ok(Self {
            kind: self.kind,
            content: template::fill(&self.content, params)?,
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}

impl std::str::FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Locator {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Decide whether `content` is a CSS selector or an XPath expression.
///
/// CSS is tried first, so a string valid in both grammars is CSS. Template
/// markers are replaced with a neutral value before either parse.
pub fn classify(content: &str) -> Result<(LocatorKind, String)> {
    let probe = if template::has_placeholders(content) {
        template::neutralize(content, NEUTRAL_PARAMETER)
    } else {
        content.to_string()
    };

    if css::is_valid(&probe) {
        return Ok((LocatorKind::Css, content.to_string()));
    }
    if xpath::is_valid(&probe) {
        return Ok((LocatorKind::Xpath, content.to_string()));
    }

    tracing::debug!("Rejected locator {:?}", content);
    Err(Error::InvalidLocatorFormat {
        locator: content.to_string(),
    })
}

/// [`classify`] for values coming out of a parsed config document.
pub fn classify_value(value: &serde_json::Value) -> Result<(LocatorKind, String)> {
    match value {
        serde_json::Value::String(content) => classify(content),
        other => Err(Error::InvalidLocatorType {
            found: json_type_name(other).to_string(),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_css() {
        assert_eq!(
            classify("#bar").unwrap(),
            (LocatorKind::Css, "#bar".to_string())
        );
    }

    #[test]
    fn test_classify_pseudo_selectors_as_css() {
        // `a:hover` is also an XPath QName step; the CSS reading must win.
        for sel in ["a:hover", "button:disabled", "input:checked", "p::before"] {
            assert_eq!(
                classify(sel).unwrap(),
                (LocatorKind::Css, sel.to_string()),
                "{sel}"
            );
        }
    }

    #[test]
    fn test_classify_xpath() {
        assert_eq!(
            classify("//foo").unwrap(),
            (LocatorKind::Xpath, "//foo".to_string())
        );
    }

    #[test]
    fn test_classify_rejects_neither() {
        let err = classify("##foo").unwrap_err();
        assert!(matches!(err, Error::InvalidLocatorFormat { ref locator } if locator == "##foo"));
    }

    #[test]
    fn test_css_wins_tie() {
        // A bare name is both a type selector and a child-axis step.
        assert_eq!(classify("div").unwrap().0, LocatorKind::Css);
    }

    #[test]
    fn test_classify_template_placeholder() {
        let (kind, content) = classify("(//div[@class='item'])[{}]").unwrap();
        assert_eq!(kind, LocatorKind::Xpath);
        assert_eq!(content, "(//div[@class='item'])[{}]");

        let (kind, _) = classify("li:nth-child({})").unwrap();
        assert_eq!(kind, LocatorKind::Css);
    }

    #[test]
    fn test_classify_value_type_guard() {
        for value in [json!(123), json!(true), json!(null), json!(["#a"])] {
            assert!(matches!(
                classify_value(&value),
                Err(Error::InvalidLocatorType { .. })
            ));
        }
        assert!(classify_value(&json!("#kw")).is_ok());
    }

    #[test]
    fn test_fill_keeps_kind() {
        let locator = Locator::new("(//div)[{}]").unwrap();
        assert!(locator.is_template());
        let filled = locator.fill(&Params::from((1,))).unwrap();
        assert_eq!(filled.kind(), LocatorKind::Xpath);
        assert_eq!(filled.content(), "(//div)[1]");
    }

    #[test]
    fn test_from_str() {
        let locator: Locator = "#kw".parse().unwrap();
        assert_eq!(locator.to_string(), "#kw");
        assert!("#.kw".parse::<Locator>().is_err());
    }
}
