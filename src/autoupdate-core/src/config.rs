//! Update configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::DEFAULT_API_BASE;
use crate::asset::{AssetAuth, platform_extension};
use crate::error::{UpdateError, UpdateResult};
use crate::version::VersionComparator;

/// Immutable configuration for one updater instance.
///
/// Built once with [`UpdateConfig::new`] and the `with_*` methods.
#[derive(Clone)]
pub struct UpdateConfig {
    owner: String,
    repo: String,
    current_version: String,
    filename_tag: Option<String>,
    access_token: Option<String>,
    include_prereleases: bool,
    comparator: VersionComparator,
    api_base: String,
    file_extension: String,
    release_page_fallback: bool,
    download_dir: PathBuf,
}

impl UpdateConfig {
    /// Create a config for `owner/repo` running `current_version`.
    pub fn new(repository: &str, current_version: &str) -> UpdateResult<Self> {
        let (owner, repo) = parse_repository(repository)?;
        let current_version = current_version.trim();
        if current_version.is_empty() {
            return Err(UpdateError::EmptyCurrentVersion);
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            current_version: current_version.to_string(),
            filename_tag: None,
            access_token: None,
            include_prereleases: false,
            comparator: VersionComparator::natural(),
            api_base: DEFAULT_API_BASE.to_string(),
            file_extension: platform_extension().to_string(),
            release_page_fallback: false,
            download_dir: std::env::temp_dir(),
        })
    }

    /// Only consider assets whose file name contains `tag`.
    pub fn with_filename_tag(mut self, tag: impl Into<String>) -> Self {
        self.filename_tag = Some(tag.into()).filter(|tag: &String| !tag.is_empty());
        self
    }

    /// Authenticate API and asset requests with a token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into()).filter(|token: &String| !token.is_empty());
        self
    }

    pub fn with_prereleases(mut self, include: bool) -> Self {
        self.include_prereleases = include;
        self
    }

    pub fn with_comparator(mut self, comparator: VersionComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Use a different API root (GitHub Enterprise, test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Offer the release page when a release has no matching asset.
    pub fn with_release_page_fallback(mut self, enabled: bool) -> Self {
        self.release_page_fallback = enabled;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Repository identifier as `owner/repo`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn filename_tag(&self) -> Option<&str> {
        self.filename_tag.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn include_prereleases(&self) -> bool {
        self.include_prereleases
    }

    pub fn comparator(&self) -> &VersionComparator {
        &self.comparator
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn release_page_fallback(&self) -> bool {
        self.release_page_fallback
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// URL of the "list releases" endpoint.
    pub fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_base, self.owner, self.repo)
    }

    /// Asset auth context, present only when a token is configured.
    pub fn asset_auth(&self) -> Option<AssetAuth<'_>> {
        self.access_token.as_ref().map(|_| AssetAuth {
            api_base: &self.api_base,
            owner: &self.owner,
            repo: &self.repo,
        })
    }
}

impl fmt::Debug for UpdateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateConfig")
            .field("repository", &self.repository())
            .field("current_version", &self.current_version)
            .field("filename_tag", &self.filename_tag)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("include_prereleases", &self.include_prereleases)
            .field("comparator", &self.comparator)
            .field("api_base", &self.api_base)
            .field("file_extension", &self.file_extension)
            .field("release_page_fallback", &self.release_page_fallback)
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

fn parse_repository(repository: &str) -> UpdateResult<(&str, &str)> {
    let invalid = || UpdateError::InvalidRepository {
        repository: repository.to_string(),
    };
    if repository.matches('/').count() != 1 {
        return Err(invalid());
    }
    let (owner, repo) = repository.split_once('/').ok_or_else(invalid)?;
    if owner.trim().is_empty() || repo.trim().is_empty() {
        return Err(invalid());
    }
    Ok((owner.trim(), repo.trim()))
}
