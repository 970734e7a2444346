//! Undoable actions
//!
//! An [`UndoableAction`] is a recorded mutation plus the snapshot needed to
//! attempt its reversal. Callers describe a mutation with [`NewAction`]; the
//! ledger assigns the id and timestamp.

use crate::document::{fields, DocRef, Document};
use crate::ids::ActionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of reversible mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// One or more records were deleted
    DeleteEntity,
    /// Title field changed
    UpdateTitle,
    /// Date field changed
    UpdateDate,
    /// Status field changed
    UpdateStatus,
    /// Assignee changed
    UpdateAssignee,
    /// Records in a collection were reordered
    ReorderEntities,
}

impl ActionKind {
    /// All kinds, in declaration order
    pub const ALL: [ActionKind; 6] = [
        ActionKind::DeleteEntity,
        ActionKind::UpdateTitle,
        ActionKind::UpdateDate,
        ActionKind::UpdateStatus,
        ActionKind::UpdateAssignee,
        ActionKind::ReorderEntities,
    ];

    /// Stable tag used in logs and audit details
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DeleteEntity => "delete_entity",
            ActionKind::UpdateTitle => "update_title",
            ActionKind::UpdateDate => "update_date",
            ActionKind::UpdateStatus => "update_status",
            ActionKind::UpdateAssignee => "update_assignee",
            ActionKind::ReorderEntities => "reorder_entities",
        }
    }

    /// Whether `payload` has the shape this kind expects
    #[must_use]
    pub fn payload_matches(&self, payload: &ActionPayload) -> bool {
        matches!(
            (self, payload),
            (ActionKind::DeleteEntity, ActionPayload::Deleted { .. })
                | (
                    ActionKind::UpdateTitle
                        | ActionKind::UpdateDate
                        | ActionKind::UpdateStatus
                        | ActionKind::UpdateAssignee,
                    ActionPayload::FieldChanged { .. }
                )
                | (ActionKind::ReorderEntities, ActionPayload::Reordered { .. })
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the state a reversal needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Full copies of every deleted record
    Deleted {
        /// Deleted records, in deletion order
        records: Vec<(DocRef, Document)>,
    },
    /// Prior value of a single field
    FieldChanged {
        /// Record that was changed
        target: DocRef,
        /// Field name
        field: String,
        /// Value before the change (`null` when the field was unset)
        previous: Value,
    },
    /// Prior ordering of records within a collection
    Reordered {
        /// Collection whose records were reordered
        collection: String,
        /// `(id, position)` pairs before the change
        previous: Vec<(String, i64)>,
    },
}

impl ActionPayload {
    /// Records touched by reversing this payload
    #[must_use]
    pub fn targets(&self) -> Vec<DocRef> {
        match self {
            ActionPayload::Deleted { records } => records.iter().map(|(r, _)| r.clone()).collect(),
            ActionPayload::FieldChanged { target, .. } => vec![target.clone()],
            ActionPayload::Reordered {
                collection,
                previous,
            } => previous
                .iter()
                .map(|(id, _)| DocRef::new(collection.clone(), id.clone()))
                .collect(),
        }
    }
}

/// Description of a mutation, before the ledger assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    kind: ActionKind,
    payload: ActionPayload,
    external: bool,
    description: String,
}

impl NewAction {
    /// Build from parts
    ///
    /// Shape mismatches between `kind` and `payload` are not rejected here;
    /// the reversal strategy reports them when the undo runs.
    #[must_use]
    pub fn new(kind: ActionKind, payload: ActionPayload) -> Self {
        let description = default_description(&payload);
        Self {
            kind,
            payload,
            external: false,
            description,
        }
    }

    /// Deletion of one or more records
    #[must_use]
    pub fn delete_entity(records: Vec<(DocRef, Document)>) -> Self {
        Self::new(ActionKind::DeleteEntity, ActionPayload::Deleted { records })
    }

    /// Change of a single field
    #[must_use]
    pub fn update_field(
        kind: ActionKind,
        target: DocRef,
        field: impl Into<String>,
        previous: Value,
    ) -> Self {
        Self::new(
            kind,
            ActionPayload::FieldChanged {
                target,
                field: field.into(),
                previous,
            },
        )
    }

    /// Title change
    #[inline]
    #[must_use]
    pub fn update_title(target: DocRef, previous: Value) -> Self {
        Self::update_field(ActionKind::UpdateTitle, target, fields::TITLE, previous)
    }

    /// Due date change
    #[inline]
    #[must_use]
    pub fn update_date(target: DocRef, previous: Value) -> Self {
        Self::update_field(ActionKind::UpdateDate, target, fields::DUE_DATE, previous)
    }

    /// Status change
    #[inline]
    #[must_use]
    pub fn update_status(target: DocRef, previous: Value) -> Self {
        Self::update_field(ActionKind::UpdateStatus, target, fields::STATUS, previous)
    }

    /// Assignee change
    #[inline]
    #[must_use]
    pub fn update_assignee(target: DocRef, previous: Value) -> Self {
        Self::update_field(ActionKind::UpdateAssignee, target, fields::ASSIGNEE, previous)
    }

    /// Reordering of records in `collection`
    #[must_use]
    pub fn reorder(collection: impl Into<String>, previous: Vec<(String, i64)>) -> Self {
        Self::new(
            ActionKind::ReorderEntities,
            ActionPayload::Reordered {
                collection: collection.into(),
                previous,
            },
        )
    }

    /// Mark as touching an external system the reversal cannot restore
    #[inline]
    #[must_use]
    pub fn with_external_sync(mut self) -> Self {
        self.external = true;
        self
    }

    /// Override the human-readable description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mutation kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Reversal snapshot
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &ActionPayload {
        &self.payload
    }

    /// Whether an external system is involved
    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Human-readable description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

fn default_description(payload: &ActionPayload) -> String {
    match payload {
        ActionPayload::Deleted { records } => match records.as_slice() {
            [single] => format!("Deleted {}", single.0),
            many => format!("Deleted {} records", many.len()),
        },
        ActionPayload::FieldChanged { target, field, .. } => {
            format!("Changed {field} on {target}")
        }
        ActionPayload::Reordered { collection, .. } => format!("Reordered {collection}"),
    }
}

/// A recorded, immutable mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoableAction {
    id: ActionId,
    kind: ActionKind,
    timestamp: DateTime<Utc>,
    payload: ActionPayload,
    external: bool,
    description: String,
}

impl UndoableAction {
    /// Materialise a [`NewAction`] with its assigned id and timestamp
    #[must_use]
    pub fn from_new(id: ActionId, timestamp: DateTime<Utc>, action: NewAction) -> Self {
        Self {
            id,
            kind: action.kind,
            timestamp,
            payload: action.payload,
            external: action.external,
            description: action.description,
        }
    }

    /// Assigned id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Mutation kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Client-side creation time
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Reversal snapshot
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &ActionPayload {
        &self.payload
    }

    /// Whether an external system is involved
    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Human-readable description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(title: &str) -> Document {
        let mut d = Document::new();
        d.insert("title".into(), json!(title));
        d
    }

    #[test]
    fn constructors_produce_matching_shapes() {
        let actions = [
            NewAction::delete_entity(vec![(DocRef::control("c1"), doc("a"))]),
            NewAction::update_title(DocRef::control("c1"), json!("a")),
            NewAction::update_date(DocRef::task("t1"), Value::Null),
            NewAction::update_status(DocRef::task("t1"), json!("open")),
            NewAction::update_assignee(DocRef::task("t1"), json!("tech-1")),
            NewAction::reorder("controls", vec![("c1".into(), 0)]),
        ];
        for action in &actions {
            assert!(action.kind().payload_matches(action.payload()), "{:?}", action.kind());
        }
    }

    #[test]
    fn mismatched_shape_is_detected() {
        let action = NewAction::new(
            ActionKind::DeleteEntity,
            ActionPayload::Reordered {
                collection: "controls".into(),
                previous: vec![],
            },
        );
        assert!(!action.kind().payload_matches(action.payload()));
    }

    #[test]
    fn default_descriptions() {
        let single = NewAction::delete_entity(vec![(DocRef::control("c1"), doc("a"))]);
        assert_eq!(single.description(), "Deleted controls/c1");

        let many = NewAction::delete_entity(vec![
            (DocRef::control("c1"), doc("a")),
            (DocRef::task("t1"), doc("b")),
        ]);
        assert_eq!(many.description(), "Deleted 2 records");

        let title = NewAction::update_title(DocRef::control("c1"), json!("x"));
        assert_eq!(title.description(), "Changed title on controls/c1");
    }

    #[test]
    fn external_flag_and_description_override() {
        let action = NewAction::update_status(DocRef::control("c1"), json!("open"))
            .with_external_sync()
            .with_description("Closed control C-1");
        assert!(action.is_external());
        assert_eq!(action.description(), "Closed control C-1");
    }

    #[test]
    fn payload_targets() {
        let reorder = ActionPayload::Reordered {
            collection: "tasks".into(),
            previous: vec![("t1".into(), 0), ("t2".into(), 1)],
        };
        assert_eq!(reorder.targets(), vec![DocRef::task("t1"), DocRef::task("t2")]);
    }
}
