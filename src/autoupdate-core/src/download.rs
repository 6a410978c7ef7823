//! Installer download with progress tracking and cancellation.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::events::{EventSink, UpdateEvent};
use crate::http::{DOWNLOAD_ACCEPT, with_headers};
use crate::install::InstallerLauncher;

/// Where the current (or last) download stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    FileOpening,
    Streaming,
    Finished,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// Download progress in percent.
///
/// An unknown or zero total, or a transfer that already reached the total,
/// counts as complete.
pub fn download_percentage(received: u64, total: Option<u64>) -> f32 {
    match total {
        Some(total) if total > 0 && received < total => {
            ((received as f64 / total as f64) * 100.0).min(100.0) as f32
        }
        _ => 100.0,
    }
}

/// Keeps reported progress monotonic and makes sure it ends at 100.
#[derive(Debug)]
struct ProgressTracker {
    received: u64,
    total: Option<u64>,
    last: Option<f32>,
}

impl ProgressTracker {
    fn new(total: Option<u64>) -> Self {
        Self {
            received: 0,
            total,
            last: None,
        }
    }

    fn advance(&mut self, bytes: usize) -> f32 {
        self.received += bytes as u64;
        let percent = download_percentage(self.received, self.total);
        let percent = self.last.map_or(percent, |last| percent.max(last));
        self.last = Some(percent);
        percent
    }

    /// Final report, if the last one was not already 100.
    fn finish(&mut self) -> Option<f32> {
        if self.last == Some(100.0) {
            return None;
        }
        self.last = Some(100.0);
        Some(100.0)
    }
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Destination for `filename` inside `dir`.
///
/// Only the final path component of `filename` is used.
pub fn destination_path(dir: &Path, filename: &str) -> UpdateResult<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| UpdateError::file_open(dir.join(filename), "no file name to write to"))?;
    let path = dir.join(name);
    std::path::absolute(&path).map_err(|e| UpdateError::file_open(&path, e))
}

#[derive(Debug, Default)]
struct Slot {
    state: DownloadState,
    open_file: Option<PathBuf>,
}

/// Handle to a running download.
#[derive(Debug)]
pub struct DownloadHandle {
    path: PathBuf,
    cancel: CancellationToken,
    task: JoinHandle<DownloadState>,
}

impl DownloadHandle {
    /// Absolute path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Abort the transfer. The partial file stays on disk and no further
    /// events are sent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this download when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the download to reach a terminal state.
    pub async fn wait(self) -> DownloadState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Download task did not complete");
                DownloadState::Failed
            }
        }
    }
}

/// Downloads installers, one at a time.
pub struct Downloader {
    config: Arc<UpdateConfig>,
    client: Client,
    events: EventSink,
    launcher: Arc<dyn InstallerLauncher>,
    slot: Arc<Mutex<Slot>>,
}

impl Downloader {
    pub fn new(
        config: Arc<UpdateConfig>,
        client: Client,
        events: EventSink,
        launcher: Arc<dyn InstallerLauncher>,
    ) -> Self {
        Self {
            config,
            client,
            events,
            launcher,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn set_launcher(&mut self, launcher: Arc<dyn InstallerLauncher>) {
        self.launcher = launcher;
    }

    pub fn state(&self) -> DownloadState {
        self.slot.lock().state
    }

    /// Download `url` into the download directory as `filename`, then hand
    /// the file to the installer launcher.
    ///
    /// Errors detected before the transfer starts are both sent to the
    /// listener and returned. Everything after that is reported through
    /// events only.
    pub fn download_and_install_update(
        &self,
        url: &str,
        filename: &str,
    ) -> UpdateResult<DownloadHandle> {
        match self.start(url, filename) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.events.error(e.duplicate());
                Err(e)
            }
        }
    }

    fn start(&self, url: &str, filename: &str) -> UpdateResult<DownloadHandle> {
        let runtime = Handle::try_current().map_err(|e| UpdateError::TransportRejected {
            message: e.to_string(),
        })?;

        let path = {
            let mut slot = self.slot.lock();
            if let Some(open) = &slot.open_file {
                return Err(UpdateError::file_open(
                    open.clone(),
                    "the previous download is still writing to it",
                ));
            }
            let path = match destination_path(self.config.download_dir(), filename) {
                Ok(path) => path,
                Err(e) => {
                    slot.state = DownloadState::Failed;
                    return Err(e);
                }
            };
            slot.state = DownloadState::FileOpening;
            slot.open_file = Some(path.clone());
            path
        };

        info!(url = %url, path = %path.display(), "Starting download");

        let cancel = CancellationToken::new();
        let job = DownloadJob {
            url: url.to_string(),
            path: path.clone(),
            token: self.config.access_token().map(str::to_string),
            client: self.client.clone(),
            events: self.events.clone(),
            launcher: Arc::clone(&self.launcher),
            slot: Arc::clone(&self.slot),
        };
        let task = runtime.spawn(job.run(cancel.clone()));

        Ok(DownloadHandle { path, cancel, task })
    }
}

enum TransferOutcome {
    Completed,
    Cancelled,
}

struct DownloadJob {
    url: String,
    path: PathBuf,
    token: Option<String>,
    client: Client,
    events: EventSink,
    launcher: Arc<dyn InstallerLauncher>,
    slot: Arc<Mutex<Slot>>,
}

impl DownloadJob {
    async fn run(self, cancel: CancellationToken) -> DownloadState {
        let outcome = self.transfer(&cancel).await;
        self.slot.lock().open_file = None;

        let state = match outcome {
            Ok(TransferOutcome::Cancelled) => {
                info!(path = %self.path.display(), "Download cancelled");
                DownloadState::Cancelled
            }
            Ok(TransferOutcome::Completed) if cancel.is_cancelled() => DownloadState::Cancelled,
            Ok(TransferOutcome::Completed) => self.install().await,
            Err(e) if cancel.is_cancelled() => {
                debug!(error = %e, "Ignoring error after cancellation");
                DownloadState::Cancelled
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Download failed");
                self.events.error(e);
                DownloadState::Failed
            }
        };

        self.set_state(state);
        state
    }

    fn set_state(&self, state: DownloadState) {
        self.slot.lock().state = state;
    }

    async fn transfer(&self, cancel: &CancellationToken) -> UpdateResult<TransferOutcome> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| UpdateError::file_open(&self.path, e))?;

        let request = with_headers(
            self.client.get(&self.url),
            DOWNLOAD_ACCEPT,
            self.token.as_deref(),
        )?
        .build()
        .map_err(|e| UpdateError::transport(&e))?;

        self.set_state(DownloadState::Streaming);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TransferOutcome::Cancelled),
            response = self.client.execute(request) => {
                response.map_err(|e| UpdateError::transport(&e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::TransportFailed {
                message: format!("Error transferring {} - server replied: {status}", self.url),
            });
        }

        let mut progress = ProgressTracker::new(response.content_length());
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    file.flush().await?;
                    return Ok(TransferOutcome::Cancelled);
                }
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| UpdateError::transport(&e))?;

            file.write_all(&chunk).await?;
            let percent = progress.advance(chunk.len());
            self.events.emit(UpdateEvent::DownloadProgress(percent));
        }

        file.flush().await?;
        drop(file);

        if let Some(percent) = progress.finish() {
            self.events.emit(UpdateEvent::DownloadProgress(percent));
        }
        debug!(bytes = progress.received, path = %self.path.display(), "Download complete");
        Ok(TransferOutcome::Completed)
    }

    async fn install(&self) -> DownloadState {
        self.events.emit(UpdateEvent::DownloadFinished);

        let launcher = Arc::clone(&self.launcher);
        let path = self.path.clone();
        let launched = tokio::task::spawn_blocking(move || launcher.launch(&path))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)));

        match launched {
            Ok(()) => DownloadState::Finished,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Installer launch failed");
                self.events.error(UpdateError::InstallerLaunchFailed {
                    message: format!("{}: {e}", self.path.display()),
                });
                DownloadState::Failed
            }
        }
    }
}
