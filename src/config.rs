//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.firmdesk.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".firmdesk.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// API connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Diagnostic polling settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log at debug level unless `--quiet` is given.
    #[serde(default)]
    pub verbose: bool,
}

/// API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the platform API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// File holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            token_file: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Diagnostic polling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval right after a diagnostic starts processing.
    #[serde(default = "default_fast_interval")]
    pub fast_interval_secs: u64,

    /// How long the fast interval is used before falling back.
    #[serde(default = "default_fast_window")]
    pub fast_window_secs: u64,

    /// Interval after the fast window.
    #[serde(default = "default_slow_interval")]
    pub slow_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: default_fast_interval(),
            fast_window_secs: default_fast_window(),
            slow_interval_secs: default_slow_interval(),
        }
    }
}

fn default_fast_interval() -> u64 {
    5
}

fn default_fast_window() -> u64 {
    120
}

fn default_slow_interval() -> u64 {
    30
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Where the clients report is written. Printed to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_report: Option<PathBuf>,

    /// Where the diagnostics file list is written. Printed to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_report: Option<PathBuf>,

    /// Directory for downloaded files.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            clients_report: None,
            diagnostics_report: None,
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref token_file) = args.token_file {
            self.api.token_file = Some(token_file.clone());
        }

        if let Some(format) = args.command.as_ref().and_then(|c| c.format()) {
            self.output.format = format;
        }
    }

    /// Settings for the API client.
    pub fn api_client_config(&self) -> crate::api::ApiClientConfig {
        crate::api::ApiClientConfig {
            base_url: self.api.base_url.clone(),
            timeout_seconds: self.api.timeout_seconds,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
