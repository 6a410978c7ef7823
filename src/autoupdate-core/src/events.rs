//! Update notifications and their delivery.
//!
//! Check and download tasks never call a listener directly. They push
//! [`UpdateEvent`]s into one unbounded channel per updater, and exactly one
//! consumer drains it: either the dispatcher task spawned by
//! [`spawn_listener`] or a caller holding the receiver. Notifications for one
//! updater therefore never overlap.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::UpdateError;
use crate::release::ChangeLog;

/// Callbacks for update progress.
///
/// Implementations are called from a tokio task, one call at a time.
pub trait UpdateStatusListener: Send + Sync {
    /// Result of a check. An empty changelog means no update is available.
    fn on_update_available(&self, changelog: ChangeLog);

    /// Download progress in percent; `100.0` means the transfer is complete.
    fn on_update_download_progress(&self, percent: f32);

    /// The installer has been written to disk.
    fn on_update_download_finished(&self);

    /// A check or download failed.
    fn on_update_error(&self, error: UpdateError);
}

/// A single notification.
#[derive(Debug)]
pub enum UpdateEvent {
    UpdateAvailable(ChangeLog),
    DownloadProgress(f32),
    DownloadFinished,
    Error(UpdateError),
}

impl UpdateEvent {
    /// Deliver this event to a listener.
    pub fn dispatch(self, listener: &dyn UpdateStatusListener) {
        match self {
            Self::UpdateAvailable(changelog) => listener.on_update_available(changelog),
            Self::DownloadProgress(percent) => listener.on_update_download_progress(percent),
            Self::DownloadFinished => listener.on_update_download_finished(),
            Self::Error(error) => listener.on_update_error(error),
        }
    }
}

/// Sending half shared by the check and download tasks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<UpdateEvent>,
}

/// Receiving half for callers that consume events themselves.
pub type EventReceiver = mpsc::UnboundedReceiver<UpdateEvent>;

impl EventSink {
    /// Create a sink and the matching receiver.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event. Events sent after the consumer is gone are dropped.
    pub fn emit(&self, event: UpdateEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Update event dropped: no consumer");
        }
    }

    pub fn error(&self, error: UpdateError) {
        self.emit(UpdateEvent::Error(error));
    }
}

/// Spawn a dispatcher task that delivers events to `listener` in order.
///
/// The task ends once every [`EventSink`] clone has been dropped.
/// Must be called from within a tokio runtime.
pub fn spawn_listener(listener: Arc<dyn UpdateStatusListener>) -> (EventSink, JoinHandle<()>) {
    let (sink, mut rx) = EventSink::channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            event.dispatch(listener.as_ref());
        }
    });
    (sink, handle)
}
