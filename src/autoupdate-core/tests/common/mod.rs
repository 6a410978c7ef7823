//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autoupdate_core::{EventReceiver, InstallerLauncher, UpdateConfig, UpdateEvent};
use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::MockServer;

pub const RELEASES_PATH: &str = "/repos/octo/app/releases";

/// Config pointing at a mock server, with a fixed platform extension.
pub fn config_for(server: &MockServer, current_version: &str) -> UpdateConfig {
    UpdateConfig::new("octo/app", current_version)
        .unwrap()
        .with_api_base(server.uri())
        .with_file_extension(".AppImage")
}

pub fn release(server: &MockServer, tag: &str) -> Value {
    json!({
        "tag_name": tag,
        "html_url": format!("{}/octo/app/releases/tag/{tag}", server.uri()),
        "body": format!("Changes in {tag}"),
        "prerelease": false,
        "assets": [
            {
                "id": 1,
                "name": "app.exe",
                "browser_download_url": format!("{}/download/{tag}/app.exe", server.uri()),
            },
            {
                "id": 2,
                "name": "app.AppImage",
                "browser_download_url": format!("{}/download/{tag}/app.AppImage", server.uri()),
            },
        ],
    })
}

/// Next event, failing the test if none arrives in time.
pub async fn next_event(events: &mut EventReceiver) -> UpdateEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for an update event")
        .expect("event channel closed")
}

/// Drain every event still queued once all senders are gone.
pub async fn remaining_events(events: &mut EventReceiver) -> Vec<UpdateEvent> {
    let mut rest = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
        rest.push(event);
    }
    rest
}

/// Launcher that records calls instead of starting anything.
#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            launched: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl InstallerLauncher for RecordingLauncher {
    fn launch(&self, installer: &Path) -> io::Result<()> {
        self.launched.lock().push(installer.to_path_buf());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "not allowed"));
        }
        Ok(())
    }
}
