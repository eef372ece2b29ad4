use std::collections::HashMap;

use super::{Locator, Params};
use crate::error::{Error, Result};

/// One logical screen: element names mapped to classified locator templates.
///
/// Names are lower-cased on the way in and on lookup, so callers can use any case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDescriptor {
    name: String,
    elements: HashMap<String, Locator>,
}

impl PageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: HashMap::new(),
        }
    }

    /// Build a descriptor from a table of element name -> locator string.
    pub fn from_value(name: &str, value: &serde_json::Value) -> Result<Self> {
        let table = value.as_object().ok_or_else(|| {
            Error::Config(format!(
                "page [{}] must be a table of element locators",
                name
            ))
        })?;

        let mut descriptor = Self::new(name);
        for (element, raw) in table {
            let locator = Locator::from_value(raw)?;
            descriptor.insert_locator(element, locator)?;
        }
        Ok(descriptor)
    }

    /// Classify `content` and register it under `element`.
    pub fn insert(&mut self, element: &str, content: &str) -> Result<()> {
        self.insert_locator(element, Locator::new(content)?)
    }

    fn insert_locator(&mut self, element: &str, locator: Locator) -> Result<()> {
        let key = normalize(element);
        if self.elements.contains_key(&key) {
            return Err(Error::Config(format!(
                "element {:?} is described twice in page [{}]",
                element, self.name
            )));
        }
        self.elements.insert(key, locator);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, element: &str) -> Option<&Locator> {
        self.elements.get(&normalize(element))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Locator)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up `element` and fill its template with `params`.
    pub fn resolve(&self, element: &str, params: impl Into<Params>) -> Result<Locator> {
        let locator = self.get(element).ok_or_else(|| Error::ElementNotDefined {
            element: element.to_string(),
            page: self.name.clone(),
        })?;
        locator.fill(&params.into())
    }
}

/// Resolve a named element of `descriptor` into a concrete locator.
pub fn resolve(
    descriptor: &PageDescriptor,
    element: &str,
    params: impl Into<Params>,
) -> Result<Locator> {
    descriptor.resolve(element, params)
}

/// Parse a document of page name -> { element name -> locator } into descriptors keyed
/// by lower-cased page name.
pub fn parse_pages(value: &serde_json::Value) -> Result<HashMap<String, PageDescriptor>> {
    let table = value
        .as_object()
        .ok_or_else(|| Error::Config("descriptor document must be a table of pages".into()))?;

    let mut pages = HashMap::with_capacity(table.len());
    for (name, elements) in table {
        let key = normalize(name);
        if pages.contains_key(&key) {
            return Err(Error::Config(format!("page [{}] is described twice", name)));
        }
        pages.insert(key, PageDescriptor::from_value(name, elements)?);
    }
    Ok(pages)
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
