//! Webhook delivery.
//!
//! Delivery is at-most-once and best-effort: one POST, no retry, no
//! dead-letter queue. Callers only learn whether it worked.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, error, info, warn};
use usersync_events::OutboundEvent;

use crate::error::DeliveryError;
use crate::http::REQUEST_TIMEOUT;
use crate::token::AccessToken;

/// Posts outbound events to a webhook consumer.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Deliver `event` to `url`.
    ///
    /// Returns `true` iff the consumer answered with a 2xx status. Every
    /// failure is logged and reported as `false`.
    pub async fn deliver(&self, url: &str, event: &OutboundEvent, token: &AccessToken) -> bool {
        match self.try_deliver(url, event, token).await {
            Ok(()) => true,
            Err(DeliveryError::Status { status, body }) => {
                warn!(
                    url = %url,
                    event_type = %event.event_type(),
                    status,
                    body = %body,
                    "Webhook rejected event"
                );
                false
            }
            Err(e) => {
                error!(
                    url = %url,
                    event_type = %event.event_type(),
                    error = %e,
                    "Failed to deliver webhook"
                );
                false
            }
        }
    }

    /// Deliver `event` to `url`, reporting why it failed.
    pub async fn try_deliver(
        &self,
        url: &str,
        event: &OutboundEvent,
        token: &AccessToken,
    ) -> Result<(), DeliveryError> {
        let body = event.to_json()?;

        debug!(
            url = %url,
            payload = %String::from_utf8_lossy(&body),
            "Sending webhook"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            url = %url,
            event_type = %event.event_type(),
            status = status.as_u16(),
            "Webhook delivered"
        );
        debug!(response = %body, "Webhook response body");

        Ok(())
    }
}
