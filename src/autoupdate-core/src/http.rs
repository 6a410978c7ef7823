//! HTTP client factory and request helpers.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, RequestBuilder};

use crate::error::{UpdateError, UpdateResult};

/// User-Agent string for all HTTP requests (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!("autoupdate/", env!("CARGO_PKG_VERSION"));

/// Content type requested from the releases API
pub const API_ACCEPT: &str = "application/vnd.github+json";

/// Content type requested for asset downloads
pub const DOWNLOAD_ACCEPT: &str = "application/octet-stream";

/// Maximum number of redirects followed by any request
pub const MAX_REDIRECTS: usize = 5;

/// Timeout for establishing a connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the release list request
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Read timeout between chunks of a download
pub const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Redirect policy: at most [`MAX_REDIRECTS`] hops, never from https to http.
pub fn redirect_policy() -> Policy {
    Policy::custom(check_redirect)
}

fn check_redirect(attempt: Attempt<'_>) -> reqwest::redirect::Action {
    if attempt.previous().len() > MAX_REDIRECTS {
        return attempt.error(format!("too many redirects (limit {MAX_REDIRECTS})"));
    }
    let downgrade = attempt
        .previous()
        .last()
        .is_some_and(|prev| is_downgrade(prev.scheme(), attempt.url().scheme()));
    if downgrade {
        let target = attempt.url().to_string();
        return attempt.error(format!("refusing insecure redirect to {target}"));
    }
    attempt.follow()
}

fn is_downgrade(from: &str, to: &str) -> bool {
    from.eq_ignore_ascii_case("https") && !to.eq_ignore_ascii_case("https")
}

/// Create the client used for release list requests.
pub fn create_api_client() -> UpdateResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(API_TIMEOUT)
        .tcp_nodelay(true)
        .redirect(redirect_policy())
        .build()
        .map_err(|e| UpdateError::TransportRejected {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Create the client used for asset downloads.
///
/// No overall timeout: installers can be large. Stalls are caught by the
/// per-read timeout instead.
pub fn create_download_client() -> UpdateResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(DOWNLOAD_READ_TIMEOUT)
        .tcp_nodelay(true)
        .redirect(redirect_policy())
        .build()
        .map_err(|e| UpdateError::TransportRejected {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Value of the `Authorization` header for a token.
pub fn token_header(token: &str) -> UpdateResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("token {token}")).map_err(|_| {
        UpdateError::TransportRejected {
            message: "access token contains invalid header characters".to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Add the accept and optional authorization headers to a request.
pub fn with_headers(
    builder: RequestBuilder,
    accept: &'static str,
    token: Option<&str>,
) -> UpdateResult<RequestBuilder> {
    let builder = builder.header(ACCEPT, accept);
    match token {
        Some(token) => Ok(builder.header(AUTHORIZATION, token_header(token)?)),
        None => Ok(builder),
    }
}
