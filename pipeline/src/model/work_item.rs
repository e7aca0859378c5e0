//! Work items and the relations between them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Link types between work items.
///
/// Only the five named kinds are followed when gathering linked items;
/// anything else (attachments, hyperlinks, custom link types) is kept as
/// `Other` and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Related,
    HierarchyForward,
    HierarchyReverse,
    DependencyForward,
    DependencyReverse,
    Other(String),
}

impl RelationKind {
    /// Parse a tracker link type name (`System.LinkTypes.Hierarchy-Forward`, ...).
    pub fn from_wire(rel: &str) -> Self {
        match rel {
            "System.LinkTypes.Related" => Self::Related,
            "System.LinkTypes.Hierarchy-Forward" => Self::HierarchyForward,
            "System.LinkTypes.Hierarchy-Reverse" => Self::HierarchyReverse,
            "System.LinkTypes.Dependency-Forward" => Self::DependencyForward,
            "System.LinkTypes.Dependency-Reverse" => Self::DependencyReverse,
            other => Self::Other(other.to_string()),
        }
    }

    /// The tracker's name for this link type.
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Related => "System.LinkTypes.Related",
            Self::HierarchyForward => "System.LinkTypes.Hierarchy-Forward",
            Self::HierarchyReverse => "System.LinkTypes.Hierarchy-Reverse",
            Self::DependencyForward => "System.LinkTypes.Dependency-Forward",
            Self::DependencyReverse => "System.LinkTypes.Dependency-Reverse",
            Self::Other(name) => name,
        }
    }

    /// Human label used when grouping linked items in a context.
    pub fn label(&self) -> &str {
        match self {
            Self::Related => "Related",
            Self::HierarchyForward => "Child",
            Self::HierarchyReverse => "Parent",
            Self::DependencyForward => "Successor",
            Self::DependencyReverse => "Predecessor",
            Self::Other(name) => name,
        }
    }

    /// Whether linked items of this kind are fetched.
    pub fn is_traversed(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An outgoing link from a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub target_id: u64,
}

/// A person reference as stored on a work item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
    pub unique_name: Option<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            unique_name: None,
        }
    }
}

/// Typed view of the fields the pipeline reads.
///
/// Fields nobody consumes land in `extra`, keyed by their tracker name, so
/// nothing the tracker sends is dropped on the floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItemFields {
    pub title: Option<String>,
    pub work_item_type: Option<String>,
    pub state: Option<String>,
    pub reason: Option<String>,
    pub priority: Option<i64>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    pub description: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub business_value: Option<i64>,
    pub tags: Option<String>,
    pub assigned_to: Option<Identity>,
    pub story_points: Option<f64>,
    pub effort: Option<f64>,
    pub created_date: Option<DateTime<Utc>>,
    pub parent: Option<u64>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A tracked unit of work (bug, task, feature, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub fields: WorkItemFields,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Set only on items reached by following a link from a primary item.
    pub relationship: Option<RelationKind>,
}

impl WorkItem {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            fields: WorkItemFields::default(),
            relations: Vec::new(),
            relationship: None,
        }
    }

    /// Stand-in for an item the tracker could not return.
    pub fn placeholder(id: u64) -> Self {
        let mut item = Self::new(id);
        item.fields.title = Some(format!("Work Item {id}"));
        item
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.fields.title = Some(title.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.fields.state = Some(state.into());
        self
    }

    pub fn with_relationship(mut self, kind: RelationKind) -> Self {
        self.relationship = Some(kind);
        self
    }

    /// Title, or an empty string when the tracker sent none.
    pub fn title(&self) -> &str {
        self.fields.title.as_deref().unwrap_or("")
    }

    pub fn is_linked(&self) -> bool {
        self.relationship.is_some()
    }

    /// Relations whose targets should be fetched as linked items.
    pub fn traversable_relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(|r| r.kind.is_traversed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_for_traversed_kinds() {
        for kind in [
            RelationKind::Related,
            RelationKind::HierarchyForward,
            RelationKind::HierarchyReverse,
            RelationKind::DependencyForward,
            RelationKind::DependencyReverse,
        ] {
            assert_eq!(RelationKind::from_wire(kind.wire_name()), kind);
            assert!(kind.is_traversed());
        }
    }

    #[test]
    fn unknown_link_types_are_not_traversed() {
        let kind = RelationKind::from_wire("AttachedFile");
        assert_eq!(kind, RelationKind::Other("AttachedFile".into()));
        assert!(!kind.is_traversed());
    }

    #[test]
    fn placeholder_carries_only_id_and_title() {
        let item = WorkItem::placeholder(7);
        assert_eq!(item.id, 7);
        assert_eq!(item.title(), "Work Item 7");
        assert!(item.fields.state.is_none());
        assert!(!item.is_linked());
    }

    #[test]
    fn traversable_relations_skip_other() {
        let mut item = WorkItem::new(1);
        item.relations = vec![
            Relation {
                kind: RelationKind::Related,
                target_id: 2,
            },
            Relation {
                kind: RelationKind::Other("Hyperlink".into()),
                target_id: 0,
            },
        ];
        let targets: Vec<u64> = item.traversable_relations().map(|r| r.target_id).collect();
        assert_eq!(targets, vec![2]);
    }
}
