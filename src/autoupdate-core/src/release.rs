//! Release list parsing.
//!
//! Turns the JSON returned by the releases endpoint into a [`ChangeLog`]:
//! one [`VersionEntry`] per release that is newer than the running version
//! and has something to download.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::asset::{AssetAuth, assets_from_json, resolve_download_url, select_asset};
use crate::config::UpdateConfig;
use crate::version::{VersionComparator, strip_version_prefix};

/// One release newer than the running version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Version with the tag prefix removed
    pub version_string: String,
    /// Release notes, verbatim
    pub version_changes: String,
    /// Asset download URL, or the release page as a fallback
    pub version_update_url: String,
    /// File name of the selected asset (empty for the release page fallback)
    pub version_update_filename: String,
}

/// Newer releases in server order. Empty means "up to date".
pub type ChangeLog = Vec<VersionEntry>;

/// The entry an installer prompt should offer.
pub fn latest_entry(changelog: &ChangeLog) -> Option<&VersionEntry> {
    changelog.first()
}

/// Everything the parser needs from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseContext<'a> {
    pub current_version: &'a str,
    pub comparator: &'a VersionComparator,
    pub file_extension: &'a str,
    pub filename_tag: Option<&'a str>,
    pub include_prereleases: bool,
    pub release_page_fallback: bool,
    pub auth: Option<AssetAuth<'a>>,
}

impl<'a> ReleaseContext<'a> {
    pub fn from_config(config: &'a UpdateConfig) -> Self {
        Self {
            current_version: config.current_version(),
            comparator: config.comparator(),
            file_extension: config.file_extension(),
            filename_tag: config.filename_tag(),
            include_prereleases: config.include_prereleases(),
            release_page_fallback: config.release_page_fallback(),
            auth: config.asset_auth(),
        }
    }
}

/// Parse a releases document (a single release or an array of releases).
pub fn parse_changelog(document: &Value, ctx: &ReleaseContext<'_>) -> ChangeLog {
    match document {
        Value::Array(releases) => releases
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|release| parse_release(release, ctx))
            .collect(),
        Value::Object(release) => parse_release(release, ctx).into_iter().collect(),
        _ => ChangeLog::new(),
    }
}

fn string_field(release: &Map<String, Value>, key: &str) -> String {
    release
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_release(release: &Map<String, Value>, ctx: &ReleaseContext<'_>) -> Option<VersionEntry> {
    let tag = string_field(release, "tag_name");
    let version = strip_version_prefix(&tag).to_string();

    if !ctx.include_prereleases
        && release
            .get("prerelease")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    {
        debug!(tag = %tag, "Skipping pre-release");
        return None;
    }

    let mut assets = assets_from_json(release.get("assets"));
    assets.retain(|asset| asset.is_resolvable(ctx.auth));
    let (url, filename) = match select_asset(&assets, ctx.file_extension, ctx.filename_tag) {
        Some(asset) => (resolve_download_url(asset, ctx.auth), asset.name.clone()),
        None if ctx.release_page_fallback => (string_field(release, "html_url"), String::new()),
        None => {
            debug!(tag = %tag, extension = ctx.file_extension, "Skipping release without matching asset");
            return None;
        }
    };

    if !ctx.comparator.less_than(ctx.current_version, &version) {
        debug!(tag = %tag, current = ctx.current_version, "Skipping release that is not newer");
        return None;
    }

    Some(VersionEntry {
        version_string: version,
        version_changes: string_field(release, "body"),
        version_update_url: url,
        version_update_filename: filename,
    })
}
