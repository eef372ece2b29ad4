//! `pagewright init`: a starter project on disk.

use std::path::{Path, PathBuf};

use crate::config::PROJECT_FILE;
use crate::error::{Error, Result};

const PROJECT_TEMPLATE: &str = r#"[settings]
# Default navigation timeout in ms for goto and wait-for-navigation.
default_navigation_timeout = 90000

[options]
# Whether to ignore HTTPS errors.
ignoreHTTPSErrors = true
# Whether to run the browser without a window.
headless = true

# Path to a Chromium or Chrome executable.
# executablePath = "/usr/bin/chromium"

# Slow down every browser operation by this many ms.
slowMo = 1.0

# Viewport of each new page.
defaultViewport = { width = 1200, height = 800 }

args = ["--lang=en", "--window-size=1200,800"]
# Proxy flags are appended to args.
# proxy = ["--proxy-server=1.1.1.1:5555,direct://", "--proxy-bypass-list=192.0.0.1/8;10.0.0.1/8"]

# Open DevTools for each tab. Forces headless off.
devtools = false

autoClose = false

[targets.target1]
name = "target1"
base_url = "https://example.com/"
descpath = "desc/target1.toml"

[targets.target2]
name = "target2"
base_url = "https://example.org/"
descpath = "desc/target2.toml"
"#;

const DESCRIPTOR_TEMPLATE: &str = r#"# page name -> element name -> css selector or xpath.
# `{}` marks a positional parameter filled in at lookup.
[HomePage]
title = "h1"
first_link = "(//a)[{}]"
"#;

fn test_template(name: &str) -> String {
    format!(
        r#"use std::sync::Arc;

use pagewright::config::Project;
use pagewright::driver::chromium::ChromiumLauncher;

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_{name}() -> pagewright::Result<()> {{
    let project = Project::load("{project}")?;
    let session = project.build_session(Arc::new(ChromiumLauncher::new()))?;
    session.setup(true).await?;

    let result = async {{
        // let target1 = session.get("target1").unwrap();
        // let title = target1.get_value("title", (), 30_000).await?;
        Ok::<_, pagewright::Error>(())
    }}
    .await;

    session.teardown(result.is_err(), Some("artifacts".as_ref())).await?;
    result
}}
"#,
        name = name,
        project = PROJECT_FILE,
    )
}

/// Test function names may only hold ASCII alphanumerics and underscores.
fn test_name(dir: &Path) -> String {
    let name: String = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".into())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("project_{}", name)
    } else {
        name
    }
}

/// Write a starter project into `dir` and return the files created.
///
/// Refuses to touch a directory that already holds a project file.
pub fn init(dir: &Path) -> Result<Vec<PathBuf>> {
    let project_file = dir.join(PROJECT_FILE);
    if project_file.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            project_file.display()
        )));
    }

    let name = test_name(dir);
    let files = [
        (project_file, PROJECT_TEMPLATE.to_string()),
        (dir.join("desc").join("target1.toml"), DESCRIPTOR_TEMPLATE.to_string()),
        (dir.join("desc").join("target2.toml"), DESCRIPTOR_TEMPLATE.to_string()),
        (dir.join("tests").join(format!("{}.rs", name)), test_template(&name)),
    ];

    let mut created = Vec::with_capacity(files.len());
    for (path, contents) in files {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            tracing::warn!("{} exists, leaving it alone", path.display());
            continue;
        }
        std::fs::write(&path, contents)?;
        tracing::info!("created {}", path.display());
        created.push(path);
    }
    Ok(created)
}
