//! The updater façade.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::checker::{CheckState, UpdateChecker};
use crate::config::UpdateConfig;
use crate::download::{DownloadHandle, DownloadState, Downloader};
use crate::error::{UpdateError, UpdateResult};
use crate::events::{EventReceiver, EventSink, UpdateStatusListener, spawn_listener};
use crate::http::{create_api_client, create_download_client};
use crate::install::{DetachedLauncher, InstallerLauncher};

/// Checks a repository for newer releases and installs them.
///
/// All results arrive asynchronously, either through an
/// [`UpdateStatusListener`] or through the receiver returned by
/// [`AutoUpdater::with_channel`]. Must be created inside a tokio runtime.
///
/// ```rust,ignore
/// let config = UpdateConfig::new("octo/app", env!("CARGO_PKG_VERSION"))?;
/// let (updater, mut events) = AutoUpdater::with_channel(config)?;
/// updater.check_for_updates()?;
///
/// while let Some(event) = events.recv().await {
///     if let UpdateEvent::UpdateAvailable(changelog) = event {
///         if let Some(entry) = latest_entry(&changelog) {
///             updater.download_and_install_update(
///                 &entry.version_update_url,
///                 &entry.version_update_filename,
///             )?;
///         }
///     }
/// }
/// ```
pub struct AutoUpdater {
    config: Arc<UpdateConfig>,
    checker: UpdateChecker,
    downloader: Downloader,
}

impl AutoUpdater {
    /// Create an updater that reports to `listener`.
    pub fn new(config: UpdateConfig, listener: Arc<dyn UpdateStatusListener>) -> UpdateResult<Self> {
        require_runtime()?;
        let (events, _dispatcher) = spawn_listener(listener);
        Self::build(config, events)
    }

    /// Create an updater whose events are read from the returned receiver.
    pub fn with_channel(config: UpdateConfig) -> UpdateResult<(Self, EventReceiver)> {
        let (events, receiver) = EventSink::channel();
        Ok((Self::build(config, events)?, receiver))
    }

    fn build(config: UpdateConfig, events: EventSink) -> UpdateResult<Self> {
        let config = Arc::new(config);
        let checker = UpdateChecker::new(Arc::clone(&config), create_api_client()?, events.clone());
        let downloader = Downloader::new(
            Arc::clone(&config),
            create_download_client()?,
            events,
            Arc::new(DetachedLauncher),
        );

        tracing::debug!(config = ?config, "Updater created");
        Ok(Self {
            config,
            checker,
            downloader,
        })
    }

    /// Replace the installer launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn InstallerLauncher>) -> Self {
        self.downloader.set_launcher(launcher);
        self
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Start an update check. See [`UpdateChecker::check_for_updates`].
    pub fn check_for_updates(&self) -> UpdateResult<JoinHandle<()>> {
        self.checker.check_for_updates()
    }

    pub fn check_state(&self) -> CheckState {
        self.checker.state()
    }

    /// Start downloading an installer. See
    /// [`Downloader::download_and_install_update`].
    pub fn download_and_install_update(
        &self,
        url: &str,
        filename: &str,
    ) -> UpdateResult<DownloadHandle> {
        self.downloader.download_and_install_update(url, filename)
    }

    pub fn download_state(&self) -> DownloadState {
        self.downloader.state()
    }
}

fn require_runtime() -> UpdateResult<()> {
    Handle::try_current()
        .map(|_| ())
        .map_err(|e| UpdateError::TransportRejected {
            message: e.to_string(),
        })
}
