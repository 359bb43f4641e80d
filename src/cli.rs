//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Firmdesk - console for the advisory platform
///
/// Lists the clients visible to your role with engagement statistics,
/// watches AI diagnostics until their reports are generated, and
/// downloads diagnostic files.
///
/// Examples:
///   firmdesk --token $TOKEN clients
///   firmdesk clients --format json --output clients.json
///   firmdesk diagnostics --engagement 42 --submit 7
///   firmdesk download --diagnostic 7 --file 19 --dir ./reports
///   firmdesk --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL of the platform API
    #[arg(long, value_name = "URL", env = "FIRMDESK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, value_name = "TOKEN", env = "FIRMDESK_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// File containing the bearer token
    #[arg(long, value_name = "FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .firmdesk.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Generate a default .firmdesk.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the clients visible to the signed-in user
    Clients {
        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show an engagement's diagnostics and watch the ones processing
    Diagnostics {
        /// Engagement whose diagnostics are shown
        #[arg(long, value_name = "ID")]
        engagement: String,

        /// Submit this diagnostic for generation before watching
        #[arg(long, value_name = "ID")]
        submit: Option<String>,

        /// Print the current state and exit without watching
        #[arg(long)]
        once: bool,

        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Write the file list to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Download a diagnostic file
    Download {
        /// Diagnostic the file belongs to
        #[arg(long, value_name = "ID")]
        diagnostic: String,

        /// File identifier
        #[arg(long, value_name = "ID")]
        file: String,

        /// Target directory (default: from config, else ./downloads)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Show the dashboard sections available to the signed-in user
    Nav,
}

impl Command {
    /// Output format given on the command line, if any.
    pub fn format(&self) -> Option<OutputFormat> {
        match self {
            Command::Clients { format, .. } | Command::Diagnostics { format, .. } => *format,
            _ => None,
        }
    }
}

/// Output format for reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("No command given. Run with --help to see the commands.".to_string());
        }

        // Validate API URL format
        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Some(Command::Diagnostics { engagement, .. }) if engagement.trim().is_empty() => {
                Err("Engagement ID must not be empty".to_string())
            }
            Some(Command::Download {
                diagnostic, file, ..
            }) if diagnostic.trim().is_empty() || file.trim().is_empty() => {
                Err("Diagnostic and file IDs must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
