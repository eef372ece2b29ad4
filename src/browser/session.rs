use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};

use super::target::Target;
use crate::error::{Error, Result};
use crate::interaction::ScreenshotOptions;

/// Every target of a test run, keyed by target name.
#[derive(Default)]
pub struct TargetSession {
    targets: BTreeMap<String, Arc<Target>>,
}

impl TargetSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target. Names must be unique.
    pub fn insert(&mut self, target: Target) -> Result<Arc<Target>> {
        let name = target.name().to_string();
        if self.targets.contains_key(&name) {
            return Err(Error::Config(format!("target {:?} is defined twice", name)));
        }
        let target = Arc::new(target);
        self.targets.insert(name, target.clone());
        Ok(target)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Target>> {
        self.targets.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Open every target concurrently.
    pub async fn setup(&self, goto_base_url: bool) -> Result<()> {
        try_join_all(self.targets.values().map(|t| t.open(goto_base_url))).await?;
        Ok(())
    }

    /// Close every target concurrently. When the test `failed` and an
    /// `artifacts_dir` is given, each open target is captured to
    /// `<artifacts_dir>/<name>.png` first.
    pub async fn teardown(&self, failed: bool, artifacts_dir: Option<&Path>) -> Result<()> {
        let results = join_all(self.targets.values().map(|target| async move {
            if let (true, Some(dir)) = (failed, artifacts_dir) {
                let options = ScreenshotOptions {
                    path: Some(dir.join(format!("{}.png", target.name()))),
                    ..Default::default()
                };
                match target.screenshot(&options).await {
                    Ok(_) | Err(Error::PageNotReady) => {}
                    Err(e) => tracing::error!(
                        "failed to capture screenshot of {}: {}",
                        target.name(),
                        e
                    ),
                }
            }
            target.close().await
        }))
        .await;

        for result in results {
            result?;
        }
        Ok(())
    }
}
