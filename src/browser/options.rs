use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::driver::Viewport;
use crate::error::{Error, Result};

fn yes() -> bool {
    true
}

fn default_slow_mo() -> f64 {
    1.0
}

fn default_viewport() -> Option<Viewport> {
    Some(Viewport::default())
}

fn default_args() -> Vec<String> {
    vec!["--lang=en".into(), "--window-size=1200,800".into()]
}

/// Browser launch options, validated on construction.
///
/// Key names follow the launcher's camelCase spelling so a config table can be
/// handed over unchanged. Once built, `proxy` is always empty: its flags have
/// been appended to `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    #[serde(rename = "ignoreHTTPSErrors", default = "yes")]
    ignore_https_errors: bool,
    #[serde(default = "yes")]
    headless: bool,
    #[serde(rename = "executablePath", default, skip_serializing_if = "Option::is_none")]
    executable_path: Option<PathBuf>,
    #[serde(rename = "slowMo", default = "default_slow_mo")]
    slow_mo: f64,
    #[serde(rename = "defaultViewport", default = "default_viewport")]
    default_viewport: Option<Viewport>,
    #[serde(default = "default_args")]
    args: Vec<String>,
    #[serde(default)]
    devtools: bool,
    #[serde(rename = "autoClose", default)]
    auto_close: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy: Option<Vec<String>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_https_errors: true,
            headless: true,
            executable_path: None,
            slow_mo: default_slow_mo(),
            default_viewport: default_viewport(),
            args: default_args(),
            devtools: false,
            auto_close: false,
            proxy: None,
        }
    }
}

impl Options {
    /// Build options from a config table (`{ headless = true, args = [...] }`).
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: Self = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid browser options: {}", e)))?;
        raw.validate()
    }

    /// Layer `overrides` on top of these options and validate the result again.
    pub fn with_overrides(&self, overrides: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut base = serde_json::to_value(self)?;
        if let Some(table) = base.as_object_mut() {
            for (key, value) in overrides {
                table.insert(key.clone(), value.clone());
            }
        }
        Self::from_value(base)
    }

    fn validate(mut self) -> Result<Self> {
        if let Some(proxy) = self.proxy.take() {
            self.args.extend(proxy);
        }
        if self.devtools {
            self.headless = false;
        }
        if let Some(path) = &self.executable_path {
            check_executable(path)?;
        }
        Ok(self)
    }

    pub fn ignore_https_errors(&self) -> bool {
        self.ignore_https_errors
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn executable_path(&self) -> Option<&Path> {
        self.executable_path.as_deref()
    }

    /// Milliseconds injected before every driver action.
    pub fn slow_mo(&self) -> f64 {
        self.slow_mo
    }

    pub fn default_viewport(&self) -> Option<&Viewport> {
        self.default_viewport.as_ref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn devtools(&self) -> bool {
        self.devtools
    }

    pub fn auto_close(&self) -> bool {
        self.auto_close
    }

    pub fn proxy(&self) -> Option<&[String]> {
        self.proxy.as_deref()
    }
}

/// An executable path must name an existing file with the execute bit set.
pub fn check_executable(path: &Path) -> Result<()> {
    if path.is_file() && which::which(path).is_ok() {
        Ok(())
    } else {
        Err(Error::PathNotExecutable {
            path: path.to_path_buf(),
        })
    }
}

fn default_navigation_timeout() -> u64 {
    90_000
}

fn millis<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_sign_negative() || !value.is_finite() {
        return Err(serde::de::Error::custom("timeout must be a non-negative number"));
    }
    Ok(value.round() as u64)
}

/// Navigation behaviour applied to every page a target opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Default timeout in ms for goto, reload and wait-for-navigation.
    #[serde(default = "default_navigation_timeout", deserialize_with = "millis")]
    pub default_navigation_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_navigation_timeout: default_navigation_timeout(),
        }
    }
}
