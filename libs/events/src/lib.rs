//! # usersync-events
//!
//! Event model shared by the usersync relay.
//!
//! ## Host events
//!
//! The identity server emits two families of lifecycle notifications:
//! - User events (`REGISTER`, `LOGIN`, `VERIFY_EMAIL`, ...) carrying a user id
//!   and a free-form details map
//! - Admin events (`USER` resource created/updated/deleted, ...) carrying a
//!   resource path such as `users/<id>`
//!
//! Both are modelled as plain read-only records behind the [`HostEvent`]
//! tagged union.
//!
//! ## Outbound events
//!
//! [`OutboundEvent`] is the JSON body posted to the webhook consumer:
//!
//! ```json
//! {"eventType": "USER_REGISTERED", "userId": "u1", "timestamp": "...", "details": {...}}
//! ```
//!
//! Event type names live in [`event_types`].

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
