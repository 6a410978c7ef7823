//! Release asset selection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset id, used by the authenticated download endpoint
    pub id: u64,
    /// File name as uploaded
    pub name: String,
    /// Public download URL
    pub browser_download_url: String,
}

impl ReleaseAsset {
    /// Build an asset from a JSON object, tolerating missing fields.
    ///
    /// A missing `name` falls back to the last path segment of the
    /// download URL.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let browser_download_url = object
            .get("browser_download_url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = match object.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => file_name_from_url(&browser_download_url).to_string(),
        };
        let id = object.get("id").and_then(Value::as_u64).unwrap_or(0);

        Some(Self {
            id,
            name,
            browser_download_url,
        })
    }

    /// True if a download URL can be built for this asset.
    ///
    /// The authenticated endpoint needs an asset id, the public one needs
    /// `browser_download_url`.
    pub fn is_resolvable(&self, auth: Option<AssetAuth<'_>>) -> bool {
        match auth {
            Some(_) => self.id != 0,
            None => !self.browser_download_url.is_empty(),
        }
    }

    /// Check whether this asset is a candidate for the given extension and tag.
    pub fn matches(&self, extension: &str, tag: Option<&str>) -> bool {
        if !self.name.contains(extension) {
            return false;
        }
        match tag {
            Some(tag) if !tag.is_empty() => self.name.contains(tag),
            _ => true,
        }
    }
}

/// Credentials needed to build the authenticated asset URL.
#[derive(Debug, Clone, Copy)]
pub struct AssetAuth<'a> {
    pub api_base: &'a str,
    pub owner: &'a str,
    pub repo: &'a str,
}

/// Normalize a release's `assets` field into a list.
///
/// GitHub returns an array; a single object is accepted as a one-element
/// list. Anything else yields no assets.
pub fn assets_from_json(value: Option<&Value>) -> Vec<ReleaseAsset> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(ReleaseAsset::from_json).collect(),
        Some(object @ Value::Object(_)) => ReleaseAsset::from_json(object).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Pick the asset to download.
///
/// The last matching asset in list order wins, so a repository can supersede
/// an upload by attaching a newer file later.
pub fn select_asset<'a>(
    assets: &'a [ReleaseAsset],
    extension: &str,
    tag: Option<&str>,
) -> Option<&'a ReleaseAsset> {
    assets.iter().rev().find(|asset| asset.matches(extension, tag))
}

/// Resolve the URL the downloader should fetch for an asset.
pub fn resolve_download_url(asset: &ReleaseAsset, auth: Option<AssetAuth<'_>>) -> String {
    match auth {
        Some(auth) => format!(
            "{}/repos/{}/{}/releases/assets/{}",
            auth.api_base.trim_end_matches('/'),
            auth.owner,
            auth.repo,
            asset.id
        ),
        None => asset.browser_download_url.clone(),
    }
}

fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Installer file extension for the current platform.
pub fn platform_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        ".exe"
    } else if cfg!(target_os = "macos") {
        ".dmg"
    } else {
        ".AppImage"
    }
}
