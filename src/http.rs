use std::time::Duration;

use reqwest::Client;
use tracing::warn;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client builder. Every outbound call is bounded by `timeout`.
pub(crate) fn client_with_timeout(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!("failed to build HTTP client with timeout, using defaults: {e}");
        Client::new()
    })
}
