//! Runtime settings shared by every subcommand.
//!
//! Values come from three layers, lowest priority first: built-in defaults,
//! an optional YAML file (`--config`), and the global CLI/env overrides.
//!
//! ```yaml
//! api_base: https://web-api-cdn.ground.news
//! site_base: https://ground.news
//! request_timeout_secs: 10
//! http_retries: 3
//! browser:
//!   headless: true
//!   recycle_every: 64
//! ```

use crate::cli::Cli;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_API_BASE: &str = "https://web-api-cdn.ground.news";
pub const DEFAULT_SITE_BASE: &str = "https://ground.news";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    pub site_base: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for publisher page fetches.
    pub http_retries: usize,
    pub retry_base_delay_ms: u64,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub page_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub scroll_pause_ms: u64,
    pub max_scrolls: u32,
    /// Relaunch a worker's browser after this many tasks; 0 disables.
    pub recycle_every: usize,
    /// Chrome/Chromium binary; found on the system when unset.
    pub chrome_executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            site_base: DEFAULT_SITE_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            http_retries: 3,
            retry_base_delay_ms: 1000,
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            page_timeout_secs: 30,
            ready_timeout_secs: 3,
            scroll_pause_ms: 2000,
            max_scrolls: 3,
            recycle_every: 64,
            chrome_executable: None,
            extra_args: Vec::new(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Apply the global CLI overrides on top of file/default values.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(api_base) = &cli.api_base {
            self.api_base = api_base.clone();
        }
        if let Some(site_base) = &cli.site_base {
            self.site_base = site_base.clone();
        }
        if let Some(user_agent) = &cli.user_agent {
            self.user_agent = user_agent.clone();
        }
        if let Some(timeout) = cli.timeout_secs {
            self.request_timeout_secs = timeout;
        }
        self
    }
}

/// Load settings from an optional YAML file, falling back to defaults.
#[instrument(level = "info")]
pub fn load_settings(path: Option<&str>) -> Result<Settings> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(Path::new(p))?;
            let settings: Settings = serde_yaml::from_str(&raw)?;
            info!(config_path = p, "Loaded configuration");
            Ok(settings)
        }
        None => Ok(Settings::default()),
    }
}
