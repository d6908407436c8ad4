//! Event routing policy and fire-and-forget dispatch.
//!
//! | Host event                         | Forwarded as          |
//! |------------------------------------|-----------------------|
//! | `REGISTER`                         | `USER_REGISTERED`     |
//! | `VERIFY_EMAIL`                     | `EMAIL_VERIFIED`      |
//! | `UPDATE_PASSWORD`                  | `PASSWORD_UPDATED`    |
//! | `LOGIN` through an identity broker | `SOCIAL_LOGIN`        |
//! | admin `USER` create/update/delete  | `USER_*_ADMIN`        |
//!
//! Everything else is dropped. Routing never blocks the caller: each
//! forwarded event is handed to its own task on the captured runtime. Nobody
//! awaits the outcome; a supervisor only logs a task that panicked.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use usersync_events::{
    detail_keys, event_types, AdminEvent, OperationType, OutboundEvent, ResourceType, UserEvent,
    UserEventKind,
};

use crate::forwarder::Forwarder;

/// Whether a login went through an external identity provider.
pub fn is_social_login(event: &UserEvent) -> bool {
    event.has_detail(detail_keys::IDENTITY_PROVIDER)
        || event.has_detail(detail_keys::IDENTITY_PROVIDER_IDENTITY)
}

/// Outbound event type for a user event, or `None` if it is not forwarded.
pub fn user_event_type(event: &UserEvent) -> Option<&'static str> {
    match event.kind {
        UserEventKind::Register => Some(event_types::USER_REGISTERED),
        UserEventKind::VerifyEmail => Some(event_types::EMAIL_VERIFIED),
        UserEventKind::UpdatePassword => Some(event_types::PASSWORD_UPDATED),
        UserEventKind::Login if is_social_login(event) => Some(event_types::SOCIAL_LOGIN),
        _ => None,
    }
}

/// Outbound event type for an admin event, or `None` if it is not forwarded.
pub fn admin_event_type(event: &AdminEvent) -> Option<&'static str> {
    if event.resource_type != ResourceType::User {
        return None;
    }

    match event.operation_type {
        OperationType::Create => Some(event_types::USER_CREATED_ADMIN),
        OperationType::Update => Some(event_types::USER_UPDATED_ADMIN),
        OperationType::Delete => Some(event_types::USER_DELETED_ADMIN),
        OperationType::Action => None,
    }
}

/// Build the outbound event for a user event. Details are passed through.
pub fn map_user_event(event: &UserEvent) -> Option<OutboundEvent> {
    user_event_type(event).map(|event_type| {
        OutboundEvent::new(event_type, event.user_id.clone(), event.details.clone())
    })
}

/// Build the outbound event for an admin event. The user id comes from the
/// resource path; admin events never carry details.
pub fn map_admin_event(event: &AdminEvent) -> Option<OutboundEvent> {
    admin_event_type(event).map(|event_type| {
        OutboundEvent::new(event_type, event.user_id().map(str::to_string), None)
    })
}

/// Maps host events and dispatches the forwarded ones in the background.
#[derive(Debug, Clone)]
pub struct EventRouter {
    forwarder: Arc<Forwarder>,
    runtime: Handle,
}

impl EventRouter {
    /// Create a router that spawns forwarding tasks on `runtime`.
    ///
    /// The runtime handle is captured so callers on non-runtime threads can
    /// still route events.
    pub fn new(forwarder: Arc<Forwarder>, runtime: Handle) -> Self {
        Self { forwarder, runtime }
    }

    /// Route a user event. Returns whether a forward was dispatched.
    pub fn on_event(&self, event: &UserEvent) -> bool {
        match map_user_event(event) {
            Some(outbound) => {
                self.dispatch(outbound);
                true
            }
            None => {
                debug!(kind = %event.kind, "Ignoring user event");
                false
            }
        }
    }

    /// Route an admin event. Returns whether a forward was dispatched.
    pub fn on_admin_event(&self, event: &AdminEvent) -> bool {
        match map_admin_event(event) {
            Some(outbound) => {
                self.dispatch(outbound);
                true
            }
            None => {
                debug!(
                    resource_type = %event.resource_type,
                    operation_type = %event.operation_type,
                    "Ignoring admin event"
                );
                false
            }
        }
    }

    fn dispatch(&self, event: OutboundEvent) {
        debug!(
            event_type = %event.event_type(),
            user_id = event.user_id().unwrap_or("-"),
            "Dispatching event"
        );

        let forwarder = Arc::clone(&self.forwarder);
        let event_type = event.event_type().to_string();
        spawn_detached(&self.runtime, event_type, async move {
            forwarder.forward(event).await;
        });
    }
}

/// Spawn `task` on `runtime` and a watcher that logs it if it panics.
///
/// The returned handle belongs to the watcher and is usually dropped.
fn spawn_detached<F>(runtime: &Handle, event_type: String, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = runtime.spawn(task);
    runtime.spawn(async move {
        if let Err(e) = handle.await {
            if e.is_panic() {
                error!(event_type = %event_type, error = %e, "Forwarding task panicked");
            }
        }
    })
}
