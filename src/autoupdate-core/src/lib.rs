//! Autoupdate Core - update checks against GitHub Releases
//!
//! Provides:
//! - Release list fetching and parsing into a [`ChangeLog`]
//! - Natural (numeric-aware) version ordering, or a caller-supplied one
//! - Platform asset selection by file extension and filename tag
//! - Installer download with progress reporting and cancellation
//! - Detached installer launch
//!
//! # Example
//!
//! ```rust,ignore
//! use autoupdate_core::{AutoUpdater, UpdateConfig, UpdateEvent};
//!
//! let config = UpdateConfig::new("octo/app", "1.2.0")?.with_filename_tag("portable");
//! let (updater, mut events) = AutoUpdater::with_channel(config)?;
//! updater.check_for_updates()?;
//!
//! if let Some(UpdateEvent::UpdateAvailable(changelog)) = events.recv().await {
//!     for entry in &changelog {
//!         println!("{} is available", entry.version_string);
//!     }
//! }
//! ```

mod asset;
mod checker;
mod config;
mod download;
mod error;
mod events;
mod http;
mod install;
mod release;
mod settings;
mod updater;
mod version;

pub use asset::{
    AssetAuth, ReleaseAsset, platform_extension, resolve_download_url, select_asset,
};
pub use checker::{CheckState, UpdateChecker, fetch_changelog, parse_release_document};
pub use config::UpdateConfig;
pub use download::{
    DownloadHandle, DownloadState, Downloader, destination_path, download_percentage,
    format_bytes,
};
pub use error::{ErrorKind, UpdateError, UpdateResult};
pub use events::{EventReceiver, EventSink, UpdateEvent, UpdateStatusListener, spawn_listener};
pub use http::{USER_AGENT, create_api_client, create_download_client};
pub use install::{DetachedLauncher, InstallerLauncher};
pub use release::{ChangeLog, ReleaseContext, VersionEntry, latest_entry, parse_changelog};
pub use settings::{TOKEN_ENV, UpdaterSettings};
pub use updater::AutoUpdater;
pub use version::{
    VersionComparator, VersionComparison, compare_versions, natural_cmp, strip_version_prefix,
};

/// Version of this crate (set at compile time)
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default releases API root
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
