use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Brave,
    Edge,
    /// A user-supplied executable, assumed to speak CDP
    Custom,
}

impl BrowserKind {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "Google Chrome",
            BrowserKind::Chromium => "Chromium",
            BrowserKind::Brave => "Brave",
            BrowserKind::Edge => "Microsoft Edge",
            BrowserKind::Custom => "custom browser",
        }
    }

    /// Executable names looked up on PATH
    fn path_names(&self) -> &'static [&'static str] {
        match self {
            BrowserKind::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            BrowserKind::Chromium => &["chromium", "chromium-browser"],
            BrowserKind::Brave => &["brave-browser", "brave"],
            BrowserKind::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
            BrowserKind::Custom => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserInfo {
    pub kind: BrowserKind,
    pub path: PathBuf,
}

impl BrowserInfo {
    pub fn new(kind: BrowserKind, path: PathBuf) -> Self {
        Self { kind, path }
    }

    /// Version string as reported by `--version`, e.g. "120.0.6099.109"
    pub fn version(&self) -> Option<String> {
        detect_version(&self.path)
    }
}

/// Locate a browser: the configured executable if any, else the first
/// well-known install location, else the first match on PATH.
pub fn discover_browser(configured: Option<&str>) -> Result<BrowserInfo> {
    if let Some(path) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(shellexpand::tilde(path).to_string());
        if !path.exists() {
            return Err(ConsoleError::BrowserLaunchFailed(format!(
                "Browser not found at: {}",
                path.display()
            )));
        }
        return Ok(BrowserInfo::new(BrowserKind::Custom, path));
    }

    for (kind, paths) in install_locations() {
        for path in paths {
            let path = PathBuf::from(shellexpand::tilde(path).to_string());
            if path.exists() {
                return Ok(BrowserInfo::new(kind, path));
            }
        }
    }

    search_path().ok_or(ConsoleError::BrowserNotFound)
}

fn search_path() -> Option<BrowserInfo> {
    [
        BrowserKind::Chromium,
        BrowserKind::Chrome,
        BrowserKind::Brave,
        BrowserKind::Edge,
    ]
    .into_iter()
    .find_map(|kind| {
        kind.path_names()
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| BrowserInfo::new(kind, path))
    })
}

fn install_locations() -> Vec<(BrowserKind, Vec<&'static str>)> {
    #[cfg(target_os = "macos")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                ],
            ),
            (
                BrowserKind::Chromium,
                vec![
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                    "~/Applications/Chromium.app/Contents/MacOS/Chromium",
                ],
            ),
            (
                BrowserKind::Brave,
                vec!["/Applications/Brave Browser.app/Contents/MacOS/Brave Browser"],
            ),
            (
                BrowserKind::Edge,
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"],
            ),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec!["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable"],
            ),
            (
                BrowserKind::Chromium,
                vec![
                    "/usr/bin/chromium",
                    "/usr/bin/chromium-browser",
                    "/snap/bin/chromium",
                ],
            ),
            (
                BrowserKind::Brave,
                vec!["/usr/bin/brave-browser", "/usr/bin/brave"],
            ),
            (
                BrowserKind::Edge,
                vec!["/usr/bin/microsoft-edge", "/usr/bin/microsoft-edge-stable"],
            ),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ],
            ),
            (
                BrowserKind::Edge,
                vec![
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                ],
            ),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

fn detect_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    // "Chromium 120.0.6099.109 built on Debian" / "Google Chrome 120.0.6099.109"
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .find(|word| word.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
