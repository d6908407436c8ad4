//! Outbound event - the JSON body posted to the webhook consumer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// A lifecycle event as delivered to the webhook consumer.
///
/// Absent fields are serialized as `null` rather than omitted, so consumers
/// always see all four keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    event_type: String,
    user_id: Option<String>,
    timestamp: DateTime<Utc>,
    details: Option<HashMap<String, String>>,
}

impl OutboundEvent {
    /// Creates an outbound event stamped with the current UTC time.
    pub fn new(
        event_type: impl Into<String>,
        user_id: Option<String>,
        details: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            user_id,
            timestamp: Utc::now(),
            details,
        }
    }

    /// Replaces the timestamp.
    pub fn occurred_at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    /// The event type (e.g., "USER_REGISTERED").
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn details(&self) -> Option<&HashMap<String, String>> {
        self.details.as_ref()
    }

    /// Encodes the event as a JSON request body.
    pub fn to_json(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(self)?)
    }
}
