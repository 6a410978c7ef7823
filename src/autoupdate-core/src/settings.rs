//! Persisted updater settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};

/// Environment variable holding the API access token.
///
/// Tokens are never written to the settings file.
pub const TOKEN_ENV: &str = "AUTOUPDATE_TOKEN";

/// User settings stored in `<config dir>/autoupdate/settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterSettings {
    /// Repository to follow (`owner/repo`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Substring that selects one asset among several for the same platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_tag: Option<String>,

    /// Offer pre-releases
    #[serde(default)]
    pub include_prereleases: bool,

    /// Custom API root (GitHub Enterprise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Fall back to the release page when no asset matches
    #[serde(default)]
    pub release_page_fallback: bool,

    /// Where installers are downloaded (default: temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Version the user chose not to be offered again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_version: Option<String>,
}

impl UpdaterSettings {
    /// Path of the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("autoupdate").join("settings.json"))
    }

    /// Load from the standard location; missing or broken files give defaults.
    pub fn load() -> Self {
        Self::settings_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings file");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> UpdateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to the standard location.
    pub fn save(&self) -> UpdateResult<()> {
        let path = Self::settings_path().ok_or_else(|| {
            UpdateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> UpdateResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check if a version should be skipped.
    pub fn is_version_skipped(&self, version: &str) -> bool {
        self.skip_version.as_deref() == Some(version)
    }

    /// Apply these settings on top of a freshly constructed config.
    ///
    /// The access token comes from [`TOKEN_ENV`] when set.
    pub fn apply(&self, mut config: UpdateConfig) -> UpdateConfig {
        if let Some(tag) = &self.filename_tag {
            config = config.with_filename_tag(tag.clone());
        }
        if let Some(url) = &self.api_url {
            config = config.with_api_base(url.clone());
        }
        if let Some(dir) = &self.download_dir {
            config = config.with_download_dir(dir.clone());
        }
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config = config.with_access_token(token.trim().to_string());
        }
        config
            .with_prereleases(self.include_prereleases)
            .with_release_page_fallback(self.release_page_fallback)
    }
}
