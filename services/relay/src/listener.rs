//! Listener lifecycle as seen by the host.
//!
//! The host registers one factory under [`PROVIDER_ID`], initializes it once,
//! then asks it for a provider per session and feeds that provider events
//! on its own threads.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::{info, warn};
use usersync_events::{AdminEvent, HostEvent, UserEvent};

use crate::config::Config;
use crate::forwarder::Forwarder;
use crate::router::EventRouter;

/// Identifier the factory is registered under.
pub const PROVIDER_ID: &str = "user-sync-event-listener";

/// Receives events from the host. Calls must return promptly.
pub trait EventListenerProvider: Send + Sync {
    fn on_event(&self, event: &UserEvent);

    fn on_admin_event(&self, event: &AdminEvent, include_representation: bool);

    /// Dispatch either kind of host event.
    fn on_host_event(&self, event: &HostEvent) {
        match event {
            HostEvent::User(event) => self.on_event(event),
            HostEvent::Admin(event) => {
                self.on_admin_event(event, event.representation.is_some())
            }
        }
    }

    fn close(&self);
}

/// Creates providers and owns whatever they share.
pub trait EventListenerProviderFactory: Send + Sync {
    type Provider: EventListenerProvider;

    fn id(&self) -> &'static str;

    /// One-time initialization with host-supplied properties.
    fn init(&mut self, properties: &HashMap<String, String>) -> Result<()>;

    /// Called after every factory in the host has been initialized.
    fn post_init(&mut self) {}

    /// Create a provider for one host session.
    fn create(&self) -> Result<Self::Provider>;

    fn close(&self);
}

/// Factory for [`UserSyncListener`].
#[derive(Debug, Default)]
pub struct UserSyncListenerFactory {
    runtime: Option<Handle>,
    router: Option<EventRouter>,
}

impl UserSyncListenerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn forwarding tasks on `runtime` instead of the runtime current at
    /// `init` time.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Initialize from an already resolved configuration.
    pub fn init_with_config(&mut self, config: Config) -> Result<()> {
        let runtime = match self.runtime.clone() {
            Some(handle) => handle,
            None => Handle::try_current()
                .context("Listener factory must be initialized inside a tokio runtime")?,
        };

        if config.client_secret.is_empty() {
            warn!(
                client_id = %config.client_id,
                "No client secret configured, token requests will likely be rejected"
            );
        }

        let forwarder = Forwarder::new(&config)?;
        info!(
            server_url = %config.server_url,
            realm = %config.realm,
            client_id = %config.client_id,
            webhook_url = %config.webhook_url,
            "UserSyncListenerFactory initialized"
        );

        self.router = Some(EventRouter::new(Arc::new(forwarder), runtime));
        Ok(())
    }
}

impl EventListenerProviderFactory for UserSyncListenerFactory {
    type Provider = UserSyncListener;

    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn init(&mut self, properties: &HashMap<String, String>) -> Result<()> {
        let config = Config::from_properties(properties)?;
        self.init_with_config(config)
    }

    fn post_init(&mut self) {
        info!("UserSyncListenerFactory post-initialized");
    }

    fn create(&self) -> Result<UserSyncListener> {
        let router = self
            .router
            .clone()
            .context("UserSyncListenerFactory used before init")?;
        Ok(UserSyncListener { router })
    }

    fn close(&self) {
        info!("UserSyncListenerFactory closed");
    }
}

/// Per-session listener that forwards user lifecycle events.
#[derive(Debug, Clone)]
pub struct UserSyncListener {
    router: EventRouter,
}

impl UserSyncListener {
    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

impl EventListenerProvider for UserSyncListener {
    fn on_event(&self, event: &UserEvent) {
        self.router.on_event(event);
    }

    fn on_admin_event(&self, event: &AdminEvent, _include_representation: bool) {
        self.router.on_admin_event(event);
    }

    fn close(&self) {
        info!("UserSyncListener closed");
    }
}
