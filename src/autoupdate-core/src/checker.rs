//! Update check state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::events::{EventSink, UpdateEvent};
use crate::http::{API_ACCEPT, with_headers};
use crate::release::{ChangeLog, ReleaseContext, parse_changelog};

/// Where the most recent check stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    Idle,
    CheckRequested,
    AwaitingResponse,
    ChangelogReady,
    Failed,
}

impl CheckState {
    /// A check has been submitted and has not produced a result yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::CheckRequested | Self::AwaitingResponse)
    }
}

/// Runs release list requests and reports the resulting changelog.
pub struct UpdateChecker {
    config: Arc<UpdateConfig>,
    client: Client,
    events: EventSink,
    state: Arc<Mutex<CheckState>>,
}

impl UpdateChecker {
    pub fn new(config: Arc<UpdateConfig>, client: Client, events: EventSink) -> Self {
        Self {
            config,
            client,
            events,
            state: Arc::new(Mutex::new(CheckState::Idle)),
        }
    }

    pub fn state(&self) -> CheckState {
        *self.state.lock()
    }

    /// Start a check in the background.
    ///
    /// Returns as soon as the work is submitted. The outcome arrives as
    /// exactly one [`UpdateEvent::UpdateAvailable`] or [`UpdateEvent::Error`].
    /// A check that is still running makes this fail with
    /// [`UpdateError::CheckInProgress`] without any event.
    pub fn check_for_updates(&self) -> UpdateResult<JoinHandle<()>> {
        let runtime = Handle::try_current().map_err(|e| UpdateError::TransportRejected {
            message: e.to_string(),
        })?;

        {
            let mut state = self.state.lock();
            if state.is_in_flight() {
                return Err(UpdateError::CheckInProgress);
            }
            *state = CheckState::CheckRequested;
        }

        let config = Arc::clone(&self.config);
        let client = self.client.clone();
        let events = self.events.clone();
        let state = Arc::clone(&self.state);

        Ok(runtime.spawn(async move {
            *state.lock() = CheckState::AwaitingResponse;
            match fetch_changelog(&client, &config).await {
                Ok(changelog) => {
                    info!(
                        repository = %config.repository(),
                        updates = changelog.len(),
                        "Update check finished"
                    );
                    *state.lock() = CheckState::ChangelogReady;
                    events.emit(UpdateEvent::UpdateAvailable(changelog));
                }
                Err(e) => {
                    warn!(repository = %config.repository(), error = %e, "Update check failed");
                    *state.lock() = CheckState::Failed;
                    events.error(e);
                }
            }
        }))
    }
}

/// Fetch the release list and turn it into a changelog.
pub async fn fetch_changelog(client: &Client, config: &UpdateConfig) -> UpdateResult<ChangeLog> {
    let url = config.releases_url();
    let request = with_headers(client.get(&url), API_ACCEPT, config.access_token())?
        .build()
        .map_err(|e| UpdateError::transport(&e))?;

    debug!(url = %url, "Requesting release list");
    let response = client
        .execute(request)
        .await
        .map_err(|e| UpdateError::transport(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpdateError::TransportFailed {
            message: format!("Error transferring {url} - server replied: {status}"),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| UpdateError::transport(&e))?;
    debug!(bytes = body.len(), "Release list received");

    parse_release_document(&body, config)
}

/// Decode a release list body.
pub fn parse_release_document(body: &[u8], config: &UpdateConfig) -> UpdateResult<ChangeLog> {
    if body.is_empty() {
        return Err(UpdateError::EmptyResponse);
    }

    let document: Value = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Release list is not valid JSON");
        UpdateError::ParseError
    })?;

    let has_data = match &document {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            debug!("Release list is a bare JSON scalar");
            return Err(UpdateError::ParseError);
        }
    };
    if !has_data {
        return Err(UpdateError::NoData);
    }

    Ok(parse_changelog(&document, &ReleaseContext::from_config(config)))
}
