use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the headless browser is launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser executable path (overrides auto-discovery)
    pub executable: Option<String>,

    /// Run without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Remote debugging port
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    /// Persistent user data directory (cookies, storage)
    pub user_data_dir: Option<String>,

    /// Extra browser arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_cdp_port() -> u16 {
    9222
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: default_headless(),
            cdp_port: default_cdp_port(),
            user_data_dir: None,
            extra_args: Vec::new(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserConfig {
    /// Resolve the user data directory, expanding `~` and falling back to
    /// `.console_browser_userdata` under the working directory.
    pub fn resolved_user_data_dir(&self) -> PathBuf {
        match self.user_data_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(shellexpand::tilde(dir).to_string()),
            _ => std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".console_browser_userdata"),
        }
    }
}
