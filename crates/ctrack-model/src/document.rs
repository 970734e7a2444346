//! Document addressing
//!
//! Records in the document store are JSON objects addressed by
//! `(collection, id)`.

use serde::{Deserialize, Serialize};

/// A stored record: a JSON object
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Well-known collection names
pub mod collections {
    /// Audit remediation items
    pub const CONTROLS: &str = "controls";
    /// Work items attached to controls
    pub const TASKS: &str = "tasks";
    /// Assignable technicians
    pub const TECHNICIANS: &str = "technicians";
    /// Append-only audit trail
    pub const AUDIT_LOGS: &str = "audit_logs";
}

/// Well-known field names on controls and tasks
pub mod fields {
    /// Display title
    pub const TITLE: &str = "title";
    /// Due / estimated completion date
    pub const DUE_DATE: &str = "estimatedCompletionDate";
    /// Workflow status
    pub const STATUS: &str = "status";
    /// Assigned technician id
    pub const ASSIGNEE: &str = "assigneeId";
    /// Ordering position within a list
    pub const ORDER: &str = "order";
}

/// Address of a single record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocRef {
    /// Collection name
    pub collection: String,
    /// Record id within the collection
    pub id: String,
}

impl DocRef {
    /// Create a reference
    #[inline]
    #[must_use]
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Reference into the controls collection
    #[inline]
    #[must_use]
    pub fn control(id: impl Into<String>) -> Self {
        Self::new(collections::CONTROLS, id)
    }

    /// Reference into the tasks collection
    #[inline]
    #[must_use]
    pub fn task(id: impl Into<String>) -> Self {
        Self::new(collections::TASKS, id)
    }
}

impl std::fmt::Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ref_display() {
        assert_eq!(DocRef::control("c1").to_string(), "controls/c1");
        assert_eq!(DocRef::task("t9").to_string(), "tasks/t9");
    }
}
