use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pagewright::config::{Project, PROJECT_FILE};
use pagewright::driver::chromium::ChromiumLauncher;
use pagewright::interaction::ScreenshotOptions;
use serde_json::json;

/// pagewright: named page descriptors and element interaction for browser tests
#[derive(Parser)]
#[command(name = "pagewright", version, about)]
struct Cli {
    /// Project file
    #[arg(long, global = true, default_value = PROJECT_FILE)]
    config: PathBuf,

    /// Path to a Chromium or Chrome executable
    #[arg(long, global = true)]
    executable_path: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,

    /// Extra browser flag without the leading dashes; repeatable
    #[arg(long = "args", global = true, value_name = "ARG", allow_hyphen_values = true)]
    browser_args: Vec<String>,

    /// Window size; `0 0` maximizes the window
    #[arg(long, global = true, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    window_size: Option<Vec<u32>>,

    /// Slow down every browser operation by this many ms
    #[arg(long, global = true)]
    slow: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter project into DIR
    Init { dir: PathBuf },
    /// Validate the project file, its options and every descriptor
    Check,
    /// Open a target at its base URL and save a screenshot
    Screenshot {
        #[arg(long)]
        target: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        full_page: bool,
    },
}

impl Cli {
    /// Launch option overrides given on the command line.
    fn overrides(&self, project: &Project) -> serde_json::Map<String, serde_json::Value> {
        let mut overrides = serde_json::Map::new();
        if let Some(path) = &self.executable_path {
            overrides.insert("executablePath".into(), json!(path));
        }
        if self.headless {
            overrides.insert("headless".into(), json!(true));
        }
        if let Some(slow) = self.slow {
            overrides.insert("slowMo".into(), json!(slow));
        }
        if !self.browser_args.is_empty() || self.window_size.is_some() {
            let mut args: Vec<String> = project.options.args().to_vec();
            if let Some(&[width, height]) = self.window_size.as_deref() {
                args.retain(|a| !a.starts_with("--window-size") && !a.starts_with("--start-maximized"));
                args.push(match (width, height) {
                    (0, 0) => "--start-maximized".to_string(),
                    _ => format!("--window-size={},{}", width, height),
                });
            }
            args.extend(self.browser_args.iter().map(|a| format!("--{}", a.trim_start_matches('-'))));
            overrides.insert("args".into(), json!(args));
        }
        overrides
    }

    fn project(&self) -> anyhow::Result<Project> {
        let project = Project::load(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        let overrides = self.overrides(&project);
        Ok(project.with_overrides(&overrides)?)
    }
}

fn check(project: &Project) -> anyhow::Result<()> {
    if project.targets.is_empty() {
        bail!("no targets defined in {}", PROJECT_FILE);
    }
    let launcher = Arc::new(ChromiumLauncher::new());
    for config in project.targets.values() {
        let target = project
            .build_target(config, launcher.clone())
            .with_context(|| format!("target {:?} is invalid", config.name))?;
        let mut pages: Vec<&str> = target.page_names().collect();
        pages.sort_unstable();
        println!(
            "{}: {} page(s) [{}], home [{}], {}",
            target.name(),
            pages.len(),
            pages.join(", "),
            config.home_page,
            target.base_url()
        );
    }
    Ok(())
}

async fn screenshot(project: &Project, name: &str, out: PathBuf, full_page: bool) -> anyhow::Result<()> {
    let config = project
        .target(name)
        .with_context(|| format!("no target named {:?}", name))?;
    let target = project.build_target(config, Arc::new(ChromiumLauncher::new()))?;

    let capture = async {
        target.open(true).await?;
        target
            .screenshot(&ScreenshotOptions {
                path: Some(out.clone()),
                full_page,
                ..Default::default()
            })
            .await?;
        Ok::<_, pagewright::Error>(())
    };

    let result = tokio::select! {
        result = capture => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt signal, shutting down");
            Ok(())
        }
    };

    // Always kill Chrome before exiting
    target.close().await?;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Init { dir } => {
            for path in pagewright::scaffold::init(dir)? {
                println!("created {}", path.display());
            }
        }
        Command::Check => check(&cli.project()?)?,
        Command::Screenshot {
            target,
            out,
            full_page,
        } => screenshot(&cli.project()?, target, out.clone(), *full_page).await?,
    }
    Ok(())
}
