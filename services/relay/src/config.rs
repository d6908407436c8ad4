//! Configuration for the relay.
//!
//! Every setting is resolved once, in order: host-supplied property,
//! environment variable, built-in default. Blank values count as missing.

use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::Url;

/// Where a single setting can come from.
#[derive(Debug, Clone, Copy)]
pub struct Setting {
    pub property: &'static str,
    pub env: &'static str,
    pub default: &'static str,
}

pub const SERVER_URL: Setting = Setting {
    property: "keycloak.server-url",
    env: "KEYCLOAK_SERVER_URL",
    default: "http://localhost:8080",
};

pub const REALM: Setting = Setting {
    property: "keycloak.realm",
    env: "KEYCLOAK_REALM",
    default: "examinai",
};

pub const CLIENT_ID: Setting = Setting {
    property: "keycloak.auth-service.client-id",
    env: "KEYCLOAK_AUTH_SERVICE_CLIENT_ID",
    default: "keycloak-spi-client",
};

pub const CLIENT_SECRET: Setting = Setting {
    property: "keycloak.auth-service.client-secret",
    env: "KEYCLOAK_AUTH_SERVICE_CLIENT_SECRET",
    default: "",
};

pub const WEBHOOK_URL: Setting = Setting {
    property: "user.sync.webhook.url",
    env: "USER_SYNC_WEBHOOK_URL",
    default: "http://localhost:8070/api/v1/auth/sync/user-event",
};

pub const LOG_FILTER: Setting = Setting {
    property: "user.sync.log",
    env: "USER_SYNC_LOG",
    default: "info",
};

/// Relay configuration.
#[derive(Clone)]
pub struct Config {
    /// Identity server base URL.
    pub server_url: String,

    /// Realm the service client lives in.
    pub realm: String,

    /// OAuth client id used for the client-credentials grant.
    pub client_id: String,

    /// OAuth client secret. Never logged.
    pub client_secret: String,

    /// Webhook consumer URL.
    pub webhook_url: String,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Config {
    /// Load configuration from host properties, falling back to the process
    /// environment.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        Self::from_sources(properties, |name| std::env::var(name).ok())
    }

    /// Load configuration from host properties and an arbitrary environment.
    pub fn from_sources<F>(properties: &HashMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |setting: Setting| -> String {
            properties
                .get(setting.property)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env(setting.env).filter(|v| !v.trim().is_empty()))
                .unwrap_or_else(|| setting.default.to_string())
        };

        let server_url = resolve(SERVER_URL);
        Url::parse(&server_url)
            .with_context(|| format!("Invalid identity server URL: {server_url}"))?;

        let webhook_url = resolve(WEBHOOK_URL);
        Url::parse(&webhook_url).with_context(|| format!("Invalid webhook URL: {webhook_url}"))?;

        Ok(Self {
            server_url,
            realm: resolve(REALM),
            client_id: resolve(CLIENT_ID),
            client_secret: resolve(CLIENT_SECRET),
            webhook_url,
            log_filter: resolve(LOG_FILTER),
        })
    }

    /// The realm's OpenID Connect token endpoint.
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.server_url.trim_end_matches('/'),
            self.realm
        )
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}
