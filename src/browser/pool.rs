use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio::sync::Mutex;

use super::options::Options;
use crate::driver::{BrowserDriver, Launcher};
use crate::error::Result;

/// Launches browsers from one set of options and closes them together.
pub struct BrowserPool {
    launcher: Arc<dyn Launcher>,
    options: Options,
    browsers: Mutex<Vec<Arc<dyn BrowserDriver>>>,
}

impl BrowserPool {
    pub fn new(launcher: Arc<dyn Launcher>, options: Options) -> Self {
        Self {
            launcher,
            options,
            browsers: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Launch one more browser.
    pub async fn launch(&self) -> Result<Arc<dyn BrowserDriver>> {
        let browser = self.launcher.launch(&self.options).await?;
        let mut browsers = self.browsers.lock().await;
        browsers.push(browser.clone());
        tracing::info!("browser #{} launched", browsers.len());
        Ok(browser)
    }

    /// Launch `count` browsers concurrently.
    pub async fn launch_many(&self, count: usize) -> Result<Vec<Arc<dyn BrowserDriver>>> {
        try_join_all((0..count).map(|_| self.launch())).await
    }

    pub async fn len(&self) -> usize {
        self.browsers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every browser launched so far. All are closed even when some
    /// fail; the first failure is returned.
    pub async fn close_all(&self) -> Result<()> {
        let browsers: Vec<_> = self.browsers.lock().await.drain(..).collect();
        if browsers.is_empty() {
            return Ok(());
        }
        tracing::info!("closing {} browser(s)", browsers.len());
        let results = join_all(browsers.iter().map(|b| b.close())).await;
        for result in results {
            result?;
        }
        Ok(())
    }
}
