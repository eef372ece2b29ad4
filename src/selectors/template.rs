use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Positional values substituted into `{}` / `{N}` markers of a locator template.
///
/// A scalar converts into a single parameter, tuples and vectors keep their order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<String>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl From<&str> for Params {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Params {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<&String> for Params {
    fn from(value: &String) -> Self {
        Self(vec![value.clone()])
    }
}

macro_rules! scalar_params {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Params {
            fn from(value: $ty) -> Self {
                Self(vec![value.to_string()])
            }
        })*
    };
}

scalar_params!(i32, i64, u32, u64, usize);

impl<T: ToString> From<Vec<T>> for Params {
    fn from(values: Vec<T>) -> Self {
        Self(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<&[T]> for Params {
    fn from(values: &[T]) -> Self {
        Self(values.iter().map(ToString::to_string).collect())
    }
}

impl<A: ToString> From<(A,)> for Params {
    fn from(values: (A,)) -> Self {
        Self(vec![values.0.to_string()])
    }
}

impl<A: ToString, B: ToString> From<(A, B)> for Params {
    fn from(values: (A, B)) -> Self {
        Self(vec![values.0.to_string(), values.1.to_string()])
    }
}

impl<A: ToString, B: ToString, C: ToString> From<(A, B, C)> for Params {
    fn from(values: (A, B, C)) -> Self {
        Self(vec![
            values.0.to_string(),
            values.1.to_string(),
            values.2.to_string(),
        ])
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{|\}\}|\{(\d*)\}").expect("placeholder pattern is valid"))
}

/// Whether `template` carries at least one positional marker.
pub fn has_placeholders(template: &str) -> bool {
    placeholder_re()
        .find_iter(template)
        .any(|m| m.as_str() != "{{" && m.as_str() != "}}")
}

/// Replace every marker with `value`, for grammar checks of unfilled templates.
pub fn neutralize(template: &str, value: &str) -> String {
    substitute(template, |_| Some(value)).unwrap_or_else(|_| template.to_string())
}

/// Fill the markers of `template` from `params` in positional order.
pub fn fill(template: &str, params: &Params) -> Result<String> {
    substitute(template, |index| params.get(index)).map_err(|index| Error::Format {
        template: template.to_string(),
        reason: format!(
            "placeholder #{} has no value, {} parameter(s) given",
            index,
            params.len()
        ),
    })
}

fn substitute<'a, F>(template: &str, mut lookup: F) -> std::result::Result<String, usize>
where
    F: FnMut(usize) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut next_auto = 0usize;

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        match whole.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            _ => {
                let index = match caps.get(1).map(|g| g.as_str()).filter(|s| !s.is_empty()) {
                    Some(explicit) => explicit.parse::<usize>().map_err(|_| usize::MAX)?,
                    None => {
                        let index = next_auto;
                        next_auto += 1;
                        index
                    }
                };
                out.push_str(lookup(index).ok_or(index)?);
            }
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}
