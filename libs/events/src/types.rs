//! Host event definitions.
//!
//! These mirror the records the identity server hands to event listeners.
//! The relay only ever reads them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EventError;

// =============================================================================
// Event Type Constants
// =============================================================================

/// Outbound event type names, as seen by the webhook consumer.
pub mod event_types {
    // Self-service user events
    pub const USER_REGISTERED: &str = "USER_REGISTERED";
    pub const EMAIL_VERIFIED: &str = "EMAIL_VERIFIED";
    pub const PASSWORD_UPDATED: &str = "PASSWORD_UPDATED";
    pub const SOCIAL_LOGIN: &str = "SOCIAL_LOGIN";

    // Admin console / admin API events
    pub const USER_CREATED_ADMIN: &str = "USER_CREATED_ADMIN";
    pub const USER_UPDATED_ADMIN: &str = "USER_UPDATED_ADMIN";
    pub const USER_DELETED_ADMIN: &str = "USER_DELETED_ADMIN";
}

/// Well-known keys in a user event's details map.
pub mod detail_keys {
    pub const IDENTITY_PROVIDER: &str = "identity_provider";
    pub const IDENTITY_PROVIDER_IDENTITY: &str = "identity_provider_identity";
}

/// Marker that precedes the user id in an admin resource path.
pub const USERS_PATH_MARKER: &str = "users/";

// =============================================================================
// Kind Enums
// =============================================================================

/// User event kind.
///
/// Only the kinds the relay cares about, plus the common neighbours, are
/// named. Anything else decodes as [`UserEventKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserEventKind {
    Login,
    LoginError,
    Register,
    RegisterError,
    Logout,
    CodeToToken,
    RefreshToken,
    SendVerifyEmail,
    VerifyEmail,
    UpdatePassword,
    ResetPassword,
    UpdateProfile,
    UpdateEmail,
    IdentityProviderLogin,
    IdentityProviderFirstLogin,
    DeleteAccount,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for UserEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserEventKind::Login => "LOGIN",
            UserEventKind::LoginError => "LOGIN_ERROR",
            UserEventKind::Register => "REGISTER",
            UserEventKind::RegisterError => "REGISTER_ERROR",
            UserEventKind::Logout => "LOGOUT",
            UserEventKind::CodeToToken => "CODE_TO_TOKEN",
            UserEventKind::RefreshToken => "REFRESH_TOKEN",
            UserEventKind::SendVerifyEmail => "SEND_VERIFY_EMAIL",
            UserEventKind::VerifyEmail => "VERIFY_EMAIL",
            UserEventKind::UpdatePassword => "UPDATE_PASSWORD",
            UserEventKind::ResetPassword => "RESET_PASSWORD",
            UserEventKind::UpdateProfile => "UPDATE_PROFILE",
            UserEventKind::UpdateEmail => "UPDATE_EMAIL",
            UserEventKind::IdentityProviderLogin => "IDENTITY_PROVIDER_LOGIN",
            UserEventKind::IdentityProviderFirstLogin => "IDENTITY_PROVIDER_FIRST_LOGIN",
            UserEventKind::DeleteAccount => "DELETE_ACCOUNT",
            UserEventKind::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

/// Admin event resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Realm,
    RealmRole,
    RealmRoleMapping,
    User,
    UserSession,
    Group,
    GroupMembership,
    Client,
    ClientRole,
    ClientScope,
    IdentityProvider,
    Component,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::Realm => "REALM",
            ResourceType::RealmRole => "REALM_ROLE",
            ResourceType::RealmRoleMapping => "REALM_ROLE_MAPPING",
            ResourceType::User => "USER",
            ResourceType::UserSession => "USER_SESSION",
            ResourceType::Group => "GROUP",
            ResourceType::GroupMembership => "GROUP_MEMBERSHIP",
            ResourceType::Client => "CLIENT",
            ResourceType::ClientRole => "CLIENT_ROLE",
            ResourceType::ClientScope => "CLIENT_SCOPE",
            ResourceType::IdentityProvider => "IDENTITY_PROVIDER",
            ResourceType::Component => "COMPONENT",
            ResourceType::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

/// Admin event operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Action,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Create => write!(f, "CREATE"),
            OperationType::Update => write!(f, "UPDATE"),
            OperationType::Delete => write!(f, "DELETE"),
            OperationType::Action => write!(f, "ACTION"),
        }
    }
}

// =============================================================================
// Host Events
// =============================================================================

/// A user-initiated lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    #[serde(rename = "type")]
    pub kind: UserEventKind,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub realm_id: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub details: Option<HashMap<String, String>>,
}

impl UserEvent {
    /// Creates an event of the given kind with no user and no details.
    pub fn new(kind: UserEventKind) -> Self {
        Self {
            kind,
            user_id: None,
            realm_id: None,
            client_id: None,
            details: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether the details map contains `key`. Missing details count as empty.
    pub fn has_detail(&self, key: &str) -> bool {
        self.details
            .as_ref()
            .is_some_and(|details| details.contains_key(key))
    }
}

/// An administrative operation on a realm resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEvent {
    pub resource_type: ResourceType,

    pub operation_type: OperationType,

    #[serde(default)]
    pub resource_path: Option<String>,

    #[serde(default)]
    pub realm_id: Option<String>,

    /// JSON representation of the resource, present only when the host is
    /// configured to include it.
    #[serde(default)]
    pub representation: Option<String>,
}

impl AdminEvent {
    pub fn new(resource_type: ResourceType, operation_type: OperationType) -> Self {
        Self {
            resource_type,
            operation_type,
            resource_path: None,
            realm_id: None,
            representation: None,
        }
    }

    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    /// User id addressed by this event's resource path, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.resource_path
            .as_deref()
            .and_then(user_id_from_resource_path)
    }
}

/// Extracts the user id from an admin resource path.
///
/// The id is the text between the first `users/` marker and the next marker,
/// cut at the first `/`. It may be empty (`users//x` gives `""`). Returns
/// `None` when the marker is absent or nothing but further markers follows it.
pub fn user_id_from_resource_path(path: &str) -> Option<&str> {
    let mut parts = path.split(USERS_PATH_MARKER);
    parts.next()?;
    let segment = parts.next()?;
    if segment.is_empty() && parts.all(str::is_empty) {
        return None;
    }
    segment.split('/').next()
}

/// Any event the host can deliver to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    User(UserEvent),
    Admin(AdminEvent),
}

impl HostEvent {
    /// Decodes a host event from its JSON form.
    ///
    /// ```json
    /// {"kind": "user", "type": "REGISTER", "userId": "u1", "details": {"username": "ada"}}
    /// {"kind": "admin", "resourceType": "USER", "operationType": "DELETE", "resourcePath": "users/u1"}
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        serde_json::from_str(raw).map_err(|e| EventError::InvalidHostEvent(e.to_string()))
    }
}

impl From<UserEvent> for HostEvent {
    fn from(event: UserEvent) -> Self {
        HostEvent::User(event)
    }
}

impl From<AdminEvent> for HostEvent {
    fn from(event: AdminEvent) -> Self {
        HostEvent::Admin(event)
    }
}
