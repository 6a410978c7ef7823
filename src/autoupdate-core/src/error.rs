//! Error types for autoupdate-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Errors that can occur while checking for or installing updates.
///
/// Runtime failures are delivered exactly once through the listener;
/// construction failures are returned from [`crate::UpdateConfig::new`].
#[derive(Debug, Error)]
pub enum UpdateError {
    // Construction errors
    #[error("Invalid repository identifier {repository:?}: expected exactly one '/' (owner/repo)")]
    InvalidRepository { repository: String },

    #[error("Current version string must not be empty")]
    EmptyCurrentVersion,

    // Network errors
    #[error("Network request rejected: {message}")]
    TransportRejected { message: String },

    #[error("{message}")]
    TransportFailed { message: String },

    #[error("No data downloaded.")]
    EmptyResponse,

    #[error("Failed to parse json data")]
    ParseError,

    #[error("Failed to read data from update server. No processing data!")]
    NoData,

    #[error("An update check is already in progress")]
    CheckInProgress,

    // Download / install errors
    #[error("Failed to open temporary file {}: {reason}", path.display())]
    FileOpen { path: PathBuf, reason: String },

    #[error("Failed to launch the downloaded update: {message}")]
    InstallerLaunchFailed { message: String },

    // Settings persistence
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    TransportRejected,
    TransportFailed,
    EmptyResponse,
    ParseError,
    NoData,
    CheckInProgress,
    FileOpen,
    InstallerLaunchFailed,
    Io,
}

impl UpdateError {
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::TransportRejected {
                message: err.to_string(),
            }
        } else {
            Self::TransportFailed {
                message: transport_message(err),
            }
        }
    }

    pub(crate) fn file_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Copy of this error for a second recipient.
    ///
    /// Wrapped I/O and JSON errors keep their kind and message but lose
    /// their source chain.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::InvalidRepository { repository } => Self::InvalidRepository {
                repository: repository.clone(),
            },
            Self::EmptyCurrentVersion => Self::EmptyCurrentVersion,
            Self::TransportRejected { message } => Self::TransportRejected {
                message: message.clone(),
            },
            Self::TransportFailed { message } => Self::TransportFailed {
                message: message.clone(),
            },
            Self::EmptyResponse => Self::EmptyResponse,
            Self::ParseError => Self::ParseError,
            Self::NoData => Self::NoData,
            Self::CheckInProgress => Self::CheckInProgress,
            Self::FileOpen { path, reason } => Self::FileOpen {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::InstallerLaunchFailed { message } => Self::InstallerLaunchFailed {
                message: message.clone(),
            },
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Json(e) => Self::Json(<serde_json::Error as serde::de::Error>::custom(e)),
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRepository { .. } | Self::EmptyCurrentVersion => ErrorKind::InvalidConfig,
            Self::TransportRejected { .. } => ErrorKind::TransportRejected,
            Self::TransportFailed { .. } => ErrorKind::TransportFailed,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::ParseError => ErrorKind::ParseError,
            Self::NoData => ErrorKind::NoData,
            Self::CheckInProgress => ErrorKind::CheckInProgress,
            Self::FileOpen { .. } => ErrorKind::FileOpen,
            Self::InstallerLaunchFailed { .. } => ErrorKind::InstallerLaunchFailed,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    /// Check if this error came from the network layer.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransportRejected | ErrorKind::TransportFailed | ErrorKind::EmptyResponse
        )
    }
}

/// Flatten a reqwest error and its source chain into one line.
fn transport_message(err: &reqwest::Error) -> String {
    use std::error::Error as _;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
