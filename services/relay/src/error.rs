//! Error types for the forwarding path.
//!
//! Neither error ever leaves a forwarding task; they exist so the token and
//! delivery steps can be tested and logged precisely.

use thiserror::Error;
use usersync_events::EventError;

/// Failure to obtain a service access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// HTTP status returned by the token endpoint, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure to deliver an event to the webhook consumer.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to encode event: {0}")]
    Serialization(#[from] EventError),

    #[error("webhook endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
