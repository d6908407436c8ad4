//! usersync Relay Library
//!
//! Relays user lifecycle events from the identity server to an external
//! webhook consumer, authenticating with a client-credentials token issued
//! by that same identity server.
//!
//! ## Architecture
//!
//! ```text
//! host event ─▶ EventRouter ─(spawn)─▶ Forwarder
//!                  │                     ├── TokenClient   (client-credentials grant)
//!               dropped                  └── WebhookSender (authenticated POST)
//! ```
//!
//! The host thread only runs the mapping; token fetch and delivery happen in
//! a detached task whose outcome is logged and never reported back.
//!
//! ## Modules
//!
//! - `config`: property / environment / default configuration
//! - `listener`: provider and factory lifecycle the host drives
//! - `router`: forwarding policy and dispatch
//! - `token`: service token acquisition
//! - `webhook`: webhook delivery

pub mod config;
pub mod error;
pub mod forwarder;
pub mod http;
pub mod listener;
pub mod router;
pub mod token;
pub mod webhook;

// Re-export commonly used types
pub use config::Config;
pub use error::{AuthError, DeliveryError};
pub use forwarder::Forwarder;
pub use listener::{
    EventListenerProvider, EventListenerProviderFactory, UserSyncListener,
    UserSyncListenerFactory, PROVIDER_ID,
};
pub use router::EventRouter;
pub use token::{AccessToken, TokenClient};
pub use webhook::WebhookSender;
