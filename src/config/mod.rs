mod browser;

pub use browser::BrowserConfig;

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};
use crate::shell::ViewMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Initial view mode
    #[serde(default)]
    pub mode: ViewMode,

    /// Max characters printed per render
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Render the page after commands that change it
    #[serde(default = "default_true")]
    pub auto: bool,
}

fn default_max_chars() -> usize {
    200_000
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: ViewMode::default(),
            max_chars: default_max_chars(),
            auto: true,
        }
    }
}

/// All values in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    /// Upper bound on waiting for a page to settle after navigation
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Default for `waitfor` when no timeout is given
    #[serde(default = "default_wait_for_ms")]
    pub wait_for_ms: u64,

    /// Per CDP command round trip
    #[serde(default = "default_command_ms")]
    pub command_ms: u64,
}

fn default_navigation_ms() -> u64 {
    30_000
}

fn default_settle_ms() -> u64 {
    6_000
}

fn default_wait_for_ms() -> u64 {
    30_000
}

fn default_command_ms() -> u64 {
    30_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            settle_ms: default_settle_ms(),
            wait_for_ms: default_wait_for_ms(),
            command_ms: default_command_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Default number of matches printed by `list`
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_list_limit() -> usize {
    50
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
        }
    }
}

impl Config {
    /// Load configuration from all sources (defaults, file, env)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        Self::figment(&config_path)
            .extract()
            .map_err(|e| ConsoleError::ConfigError(e.to_string()))
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // CONSOLE_BROWSER_RENDER__MAX_CHARS -> render.max_chars
            .merge(Env::prefixed("CONSOLE_BROWSER_").split("__"))
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("console-browser")
            .join("config.toml")
    }
}
