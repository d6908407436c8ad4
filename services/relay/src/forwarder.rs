//! One forwarding attempt: fetch a token, then deliver.

use anyhow::Result;
use tracing::{error, info, warn};
use usersync_events::OutboundEvent;

use crate::config::Config;
use crate::http;
use crate::token::TokenClient;
use crate::webhook::WebhookSender;

/// Performs token fetch + webhook delivery for a single event.
///
/// Holds no mutable state; one instance is shared by every forwarding task.
#[derive(Debug, Clone)]
pub struct Forwarder {
    tokens: TokenClient,
    sender: WebhookSender,
    webhook_url: String,
}

impl Forwarder {
    /// Create a forwarder with its own HTTP client.
    pub fn new(config: &Config) -> Result<Self> {
        let client = http::build_client()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a forwarder on an existing HTTP client.
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            tokens: TokenClient::new(client.clone(), config),
            sender: WebhookSender::new(client),
            webhook_url: config.webhook_url.clone(),
        }
    }

    /// Forward one event. Returns whether the consumer accepted it.
    ///
    /// Never fails: token and delivery errors end up in the log.
    pub async fn forward(&self, event: OutboundEvent) -> bool {
        let token = match self.tokens.fetch_service_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(
                    event_type = %event.event_type(),
                    user_id = event.user_id().unwrap_or("-"),
                    status = e.status(),
                    error = %e,
                    "Failed to obtain service token, event dropped"
                );
                return false;
            }
        };

        let delivered = self.sender.deliver(&self.webhook_url, &event, &token).await;

        if delivered {
            info!(
                event_type = %event.event_type(),
                user_id = event.user_id().unwrap_or("-"),
                "Synced user event"
            );
        } else {
            warn!(
                event_type = %event.event_type(),
                user_id = event.user_id().unwrap_or("-"),
                "Failed to sync user event"
            );
        }

        delivered
    }
}
