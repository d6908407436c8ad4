//! Service token acquisition.
//!
//! The relay authenticates to the webhook consumer with a bearer token issued
//! by the identity server for the relay's own service client, obtained with
//! the OAuth2 client-credentials grant. Tokens are not cached: each call is a
//! full round trip.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AuthError;

/// A bearer token. Its value is redacted from `Debug` output.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_in: Option<Duration>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            expires_in,
        }
    }

    /// The raw token, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Lifetime reported by the server.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Client-credentials token client.
#[derive(Clone)]
pub struct TokenClient {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Fetch a fresh service access token.
    pub async fn fetch_service_token(&self) -> Result<AccessToken, AuthError> {
        debug!(endpoint = %self.endpoint, client_id = %self.client_id, "Requesting service token");

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "Token endpoint unreachable");
                AuthError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                endpoint = %self.endpoint,
                status = %status,
                body = %body,
                "Failed to obtain service token"
            );
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(AuthError::Transport)?;
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "Unparsable token response");
            AuthError::InvalidResponse(e.to_string())
        })?;

        info!(
            client_id = %self.client_id,
            token_type = parsed.token_type.as_deref().unwrap_or("unknown"),
            expires_in = parsed.expires_in,
            "Obtained service token"
        );

        Ok(AccessToken::new(
            parsed.access_token,
            parsed.expires_in.map(Duration::from_secs),
        ))
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
