//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Check a GitHub repository for a newer release and install it.
#[derive(Debug, Parser)]
#[command(name = "autoupdate", version, about, long_about = None)]
pub struct Cli {
    /// Repository to check, as `owner/repo` (default: from the settings file)
    #[arg(value_name = "OWNER/REPO")]
    pub repository: Option<String>,

    /// Version of the installed application
    #[arg(long, value_name = "VERSION")]
    pub current_version: String,

    /// Only accept assets whose file name contains this text
    #[arg(long, short = 't', value_name = "TAG")]
    pub tag: Option<String>,

    /// Access token for private repositories
    #[arg(long, env = "AUTOUPDATE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Include pre-releases
    #[arg(long)]
    pub pre: bool,

    /// Releases API root (GitHub Enterprise)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Installer file extension (default: .exe, .dmg or .AppImage for this platform)
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Offer the release page when a release has no matching installer
    #[arg(long)]
    pub fallback: bool,

    /// Directory to download the installer into
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Only check for updates without installing
    #[arg(long, short = 'c')]
    pub check: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Print nothing when up to date and no error details
    #[arg(long, short = 's')]
    pub silent: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "PATH", hide = true)]
    pub settings: Option<PathBuf>,
}
