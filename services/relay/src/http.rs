//! Shared HTTP client.

use std::time::Duration;

use anyhow::{Context, Result};

/// Connection establishment timeout for every outbound call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-request timeout for every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the client used for both the token endpoint and the webhook.
///
/// `reqwest::Client` pools connections internally and is cheap to clone, so
/// one instance is shared by all forwarding tasks.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("usersync-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
