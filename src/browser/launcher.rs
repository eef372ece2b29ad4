use std::path::PathBuf;

use super::options::{check_executable, Options};
use crate::driver::DriverError;

/// Names tried on `PATH` once the install locations are exhausted.
const PATH_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium-browser",
    "chromium",
];

/// Locate a browser for options that carry no `executablePath`.
///
/// Candidates must pass the same check as a configured path; the error lists
/// every place that was searched.
pub fn find_chrome_binary() -> Result<PathBuf, DriverError> {
    let installs = install_locations();
    if let Some(path) = first_executable(&installs) {
        tracing::info!("Found Chrome at: {}", path.display());
        return Ok(path);
    }

    let on_path: Vec<PathBuf> = PATH_NAMES
        .iter()
        .filter_map(|name| which::which(name).ok())
        .collect();
    if let Some(path) = first_executable(&on_path) {
        tracing::info!("Found Chrome in PATH: {}", path.display());
        return Ok(path);
    }

    let mut searched = installs;
    searched.extend(PATH_NAMES.iter().map(PathBuf::from));
    Err(DriverError::BrowserNotFound { searched })
}

fn first_executable(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|path| check_executable(path).is_ok())
        .cloned()
}

fn install_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "linux")]
    paths.extend(
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
        ]
        .map(PathBuf::from),
    );

    #[cfg(target_os = "macos")]
    {
        paths.extend(
            [
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ]
            .map(PathBuf::from),
        );
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(
                PathBuf::from(home).join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            );
        }
    }

    #[cfg(target_os = "windows")]
    {
        paths.extend(
            [
                "C:/Program Files/Google/Chrome/Application/chrome.exe",
                "C:/Program Files (x86)/Google/Chrome/Application/chrome.exe",
            ]
            .map(PathBuf::from),
        );
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            paths.push(PathBuf::from(local).join(r"Google\Chrome\Application\chrome.exe"));
        }
    }

    paths
}

/// Command-line flags for a browser launched with `options`.
///
/// Fixed hygiene flags come first, then the flags derived from options, then
/// the user's own `args` so they can override anything before them.
pub fn launch_args(options: &Options) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--disable-background-networking".into(),
        "--disable-client-side-phishing-detection".into(),
        "--disable-default-apps".into(),
        "--disable-extensions".into(),
        "--disable-hang-monitor".into(),
        "--disable-popup-blocking".into(),
        "--disable-prompt-on-repost".into(),
        "--disable-sync".into(),
        "--disable-translate".into(),
        "--metrics-recording-only".into(),
        "--safebrowsing-disable-auto-update".into(),
    ];

    if options.headless() {
        args.push("--headless=new".into());
    }
    if options.ignore_https_errors() {
        args.push("--ignore-certificate-errors".into());
    }
    if options.devtools() {
        args.push("--auto-open-devtools-for-tabs".into());
    }
    if !options
        .args()
        .iter()
        .any(|a| a.starts_with("--window-size") || a.starts_with("--start-maximized"))
    {
        args.push("--window-size=1200,800".into());
    }

    args.extend(options.args().iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_launch_args_headless() {
        let args = launch_args(&Options::default());
        assert_eq!(args[0], "--no-first-run");
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        // The default args already carry a window size.
        assert_eq!(args.iter().filter(|a| a.starts_with("--window-size")).count(), 1);
        assert_eq!(args.last().unwrap(), "--window-size=1200,800");
    }

    #[cfg(unix)]
    #[test]
    fn test_first_executable_skips_plain_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("chrome-data");
        let binary = dir.path().join("chrome");
        std::fs::write(&plain, "").unwrap();
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let missing = dir.path().join("missing");
        assert_eq!(
            first_executable(&[missing.clone(), plain.clone(), binary.clone()]),
            Some(binary)
        );
        assert_eq!(first_executable(&[missing, plain]), None);
    }

    #[test]
    fn test_not_found_lists_searched_paths() {
        let err = DriverError::BrowserNotFound {
            searched: vec![PathBuf::from("/usr/bin/chromium"), PathBuf::from("chromium")],
        };
        let message = err.to_string();
        assert!(message.contains("executablePath"));
        assert!(message.contains("/usr/bin/chromium, chromium"));
    }

    #[test]
    fn test_launch_args_devtools() {
        let options = Options::from_value(json!({
            "devtools": true,
            "ignoreHTTPSErrors": false,
            "args": ["--start-maximized"]
        }))
        .unwrap();
        let args = launch_args(&options);
        assert!(!args.contains(&"--headless=new".to_string()));
        assert!(!args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&"--auto-open-devtools-for-tabs".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--window-size")));
    }
}
