//! Audit records
//!
//! [`AuditDraft`] is what callers hand to the trail writer; [`AuditEvent`] is
//! what the store holds once it has assigned an id and a server timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of the user initiating an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Stable user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

impl Actor {
    /// Create an actor
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }

    /// Placeholder identity for session-termination events with no user
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("anonymous", "Anonymous", "")
    }
}

/// Audit action vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    /// Record created
    Create,
    /// Record updated
    Update,
    /// Record deleted
    Delete,
    /// Session started
    Login,
    /// Session ended
    Logout,
    /// Data exported
    Export,
    /// File uploaded
    Upload,
    /// A previous mutation was reversed
    Undo,
    /// Bulk operation, e.g. `bulk_delete`
    Bulk(String),
    /// API call record, e.g. `api_post`
    Api(String),
    /// Anything outside the vocabulary
    Custom(String),
}

impl AuditAction {
    /// Wire tag for this action
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            AuditAction::Create => "create".into(),
            AuditAction::Update => "update".into(),
            AuditAction::Delete => "delete".into(),
            AuditAction::Login => "login".into(),
            AuditAction::Logout => "logout".into(),
            AuditAction::Export => "export".into(),
            AuditAction::Upload => "upload".into(),
            AuditAction::Undo => "undo".into(),
            AuditAction::Bulk(op) => format!("bulk_{op}"),
            AuditAction::Api(method) => format!("api_{}", method.to_ascii_lowercase()),
            AuditAction::Custom(tag) => tag.clone(),
        }
    }

    /// Session termination may be written without an identified actor
    #[inline]
    #[must_use]
    pub fn is_session_termination(&self) -> bool {
        matches!(self, AuditAction::Logout)
    }
}

impl From<String> for AuditAction {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "create" => AuditAction::Create,
            "update" => AuditAction::Update,
            "delete" => AuditAction::Delete,
            "login" => AuditAction::Login,
            "logout" => AuditAction::Logout,
            "export" => AuditAction::Export,
            "upload" => AuditAction::Upload,
            "undo" => AuditAction::Undo,
            _ => {
                if let Some(op) = tag.strip_prefix("bulk_") {
                    AuditAction::Bulk(op.to_string())
                } else if let Some(method) = tag.strip_prefix("api_") {
                    AuditAction::Api(method.to_string())
                } else {
                    AuditAction::Custom(tag)
                }
            }
        }
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.tag()
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Audit record before the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    /// Initiating user, if known
    pub actor: Option<Actor>,
    /// What happened
    pub action: AuditAction,
    /// Subject type, e.g. `control`
    pub entity_type: String,
    /// Subject id
    pub entity_id: String,
    /// Subject display name; falls back to `entity_id`
    pub entity_name: Option<String>,
    /// Action-specific context
    pub details: Map<String, Value>,
}

impl AuditDraft {
    /// Create a draft with no name and empty details
    #[must_use]
    pub fn new(
        actor: Option<Actor>,
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            entity_name: None,
            details: Map::new(),
        }
    }

    /// Set the display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    /// Add one detail attribute
    #[inline]
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Replace all details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

/// Persisted, immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Store-assigned id
    pub id: String,
    /// Store-assigned server time
    pub timestamp: DateTime<Utc>,
    /// Initiating user id
    pub actor_id: String,
    /// Initiating user name
    pub actor_name: String,
    /// Initiating user email
    pub actor_email: String,
    /// Action tag
    pub action: AuditAction,
    /// Subject type
    pub entity_type: String,
    /// Subject id
    pub entity_id: String,
    /// Subject display name
    pub entity_name: String,
    /// Action-specific context
    #[serde(default)]
    pub details: Map<String, Value>,
}
