//! The `pagewright.toml` project file.
//!
//! ```toml
//! [settings]
//! default_navigation_timeout = 90000
//!
//! [options]
//! headless = true
//! args = ["--lang=en", "--window-size=1200,800"]
//!
//! [targets.target1]
//! name = "movie"
//! base_url = "https://movie.example.com/"
//! descpath = "desc/movie.toml"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::browser::{Options, Settings, Target, TargetSession, DEFAULT_HOME_PAGE};
use crate::driver::Launcher;
use crate::error::{Error, Result};
use crate::selectors::descriptor::parse_pages;
use crate::selectors::PageDescriptor;

pub const PROJECT_FILE: &str = "pagewright.toml";

fn default_home_page() -> String {
    DEFAULT_HOME_PAGE.into()
}

/// One `[targets.<key>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub name: String,
    pub base_url: String,
    /// Descriptor file, relative to the project file.
    pub descpath: PathBuf,
    #[serde(default = "default_home_page")]
    pub home_page: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    options: toml::Table,
    #[serde(default)]
    targets: BTreeMap<String, TargetConfig>,
}

/// A loaded project file with validated options.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    pub settings: Settings,
    pub options: Options,
    pub targets: BTreeMap<String, TargetConfig>,
}

impl Project {
    /// Read and validate the project file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&text, root)
    }

    /// Parse project file text; descriptor paths resolve against `root`.
    pub fn parse(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let raw: RawProject = toml::from_str(text)?;
        let options = Options::from_value(serde_json::to_value(&raw.options)?)?;
        Ok(Self {
            root: root.into(),
            settings: raw.settings,
            options,
            targets: raw.targets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Layer option overrides (from the command line, say) over the file's.
    pub fn with_overrides(mut self, overrides: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        if !overrides.is_empty() {
            self.options = self.options.with_overrides(overrides)?;
        }
        Ok(self)
    }

    /// Target config by its `name`.
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.values().find(|t| t.name == name)
    }

    pub fn descriptor_path(&self, target: &TargetConfig) -> PathBuf {
        self.root.join(&target.descpath)
    }

    /// Load and classify every page descriptor of `target`.
    pub fn load_pages(&self, target: &TargetConfig) -> Result<HashMap<String, PageDescriptor>> {
        let path = self.descriptor_path(target);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "cannot read descriptor {} of target {:?}: {}",
                path.display(),
                target.name,
                e
            ))
        })?;
        let document: toml::Table = toml::from_str(&text)?;
        parse_pages(&serde_json::to_value(&document)?)
    }

    pub fn build_target(&self, target: &TargetConfig, launcher: Arc<dyn Launcher>) -> Result<Target> {
        Target::builder(&target.name, &target.base_url)
            .pages(self.load_pages(target)?)
            .home_page(&target.home_page)
            .options(self.options.clone())
            .settings(self.settings)
            .build(launcher)
    }

    /// Build every target, all sharing `launcher`.
    pub fn build_session(&self, launcher: Arc<dyn Launcher>) -> Result<TargetSession> {
        let mut session = TargetSession::new();
        for target in self.targets.values() {
            session.insert(self.build_target(target, launcher.clone())?)?;
        }
        Ok(session)
    }
}
