use std::path::PathBuf;

use thiserror::Error;

use crate::driver::DriverError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by locator handling, targets and page interaction.
///
/// Anything the browser driver reports that is not a wait timeout is carried
/// through `Driver` untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid locator type: expected a string, got {found}")]
    InvalidLocatorType { found: String },

    #[error("locator {locator:?} is neither a valid css selector nor a valid xpath")]
    InvalidLocatorFormat { locator: String },

    #[error("no such element {element:?} in page [{page}]")]
    ElementNotDefined { element: String, page: String },

    #[error("page [{page}] is not described for target {target:?}")]
    PageNotDefined { page: String, target: String },

    #[error("element {locator:?} does not exist")]
    ElementNotExist { locator: String },

    #[error("wait for element {locator:?} to {action} failed: timeout {timeout}ms exceeded")]
    ElementTimeout {
        locator: String,
        timeout: u64,
        action: WaitAction,
    },

    #[error("element {locator:?} has no clickable point after {attempts} attempts")]
    ElementNotClickable { locator: String, attempts: u32 },

    #[error("path {} does not point to an executable file", path.display())]
    PathNotExecutable { path: PathBuf },

    #[error("target {target:?} has no home page [{home_page}]")]
    HomePageMissing { target: String, home_page: String },

    #[error("cannot fill locator template {template:?}: {reason}")]
    Format { template: String, reason: String },

    #[error("no browser attached, open the target first")]
    BrowserNotOpen,

    #[error("no page attached, open the target first")]
    PageNotReady,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// What a wait was expecting the element to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitAction {
    Appear,
    Disappear,
}

impl WaitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appear => "appear",
            Self::Disappear => "disappear",
        }
    }
}

impl std::fmt::Display for WaitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for WaitAction {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_action() {
        let err = Error::ElementTimeout {
            locator: "#kw".into(),
            timeout: 100,
            action: WaitAction::Disappear,
        };
        assert_eq!(
            err.to_string(),
            r##"wait for element "#kw" to disappear failed: timeout 100ms exceeded"##
        );
    }

    #[test]
    fn test_driver_error_is_transparent() {
        let inner = DriverError::Other(anyhow::anyhow!("net::ERR_CERT_AUTHORITY_INVALID"));
        let err: Error = inner.into();
        assert_eq!(err.to_string(), "net::ERR_CERT_AUTHORITY_INVALID");
    }
}
