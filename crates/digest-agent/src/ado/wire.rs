//! Azure DevOps REST payloads and their conversion into pipeline types.
//!
//! Work item fields arrive as a flat map keyed by reference name
//! (`System.Title`, `Microsoft.VSTS.Common.Priority`, ...). The fields the
//! pipeline reads are lifted into [`WorkItemFields`]; everything else is
//! kept in `extra`.

use serde::Deserialize;
use serde_json::{Map, Value};

use pipeline::model::{
    parse_timestamp, FieldChange, Identity, Relation, RelationKind, Revision, WorkItem,
    WorkItemFields, HISTORY_FIELD,
};

const CHANGED_DATE_FIELD: &str = "System.ChangedDate";

#[derive(Debug, Deserialize)]
pub struct WireWorkItem {
    pub id: u64,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub relations: Vec<WireRelation>,
}

#[derive(Debug, Deserialize)]
pub struct WireRelation {
    pub rel: String,
    #[serde(default)]
    pub url: String,
}

impl WireRelation {
    /// Id of the linked work item, when the link points at one.
    pub fn target_id(&self) -> Option<u64> {
        let (_, tail) = self.url.rsplit_once("/workItems/")?;
        tail.trim_end_matches('/').parse().ok()
    }
}

/// Body of `GET .../workItems/{id}/updates`.
#[derive(Debug, Deserialize)]
pub struct WireUpdates {
    #[serde(default)]
    pub value: Vec<WireUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct WireUpdate {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub rev: Option<u64>,
    #[serde(rename = "revisedBy", default)]
    pub revised_by: Option<Value>,
    #[serde(rename = "revisedDate", default)]
    pub revised_date: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Render a field value the way a reader would expect to see it.
///
/// Identity objects collapse to their display name; null becomes empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("displayName").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn identity(value: &Value) -> Option<Identity> {
    match value {
        Value::Object(obj) => {
            let display_name = obj.get("displayName").and_then(Value::as_str)?;
            Some(Identity {
                display_name: display_name.to_string(),
                unique_name: obj
                    .get("uniqueName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        // Older API versions send "Name <user@domain>".
        Value::String(s) if !s.trim().is_empty() => {
            let (name, unique) = match s.split_once('<') {
                Some((name, rest)) => (name.trim(), Some(rest.trim_end_matches('>').trim())),
                None => (s.trim(), None),
            };
            Some(Identity {
                display_name: name.to_string(),
                unique_name: unique.map(str::to_string),
            })
        }
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(value_text(other)),
    }
}

impl From<WireWorkItem> for WorkItem {
    fn from(wire: WireWorkItem) -> Self {
        let mut raw = wire.fields;
        let mut take = |name: &str| raw.remove(name);

        let mut fields = WorkItemFields {
            title: take("System.Title").as_ref().and_then(as_string),
            work_item_type: take("System.WorkItemType").as_ref().and_then(as_string),
            state: take("System.State").as_ref().and_then(as_string),
            reason: take("System.Reason").as_ref().and_then(as_string),
            priority: take("Microsoft.VSTS.Common.Priority").as_ref().and_then(as_i64),
            area_path: take("System.AreaPath").as_ref().and_then(as_string),
            iteration_path: take("System.IterationPath").as_ref().and_then(as_string),
            description: take("System.Description").as_ref().and_then(as_string),
            acceptance_criteria: take("Microsoft.VSTS.Common.AcceptanceCriteria")
                .as_ref()
                .and_then(as_string),
            business_value: take("Microsoft.VSTS.Common.BusinessValue")
                .as_ref()
                .and_then(as_i64),
            tags: take("System.Tags").as_ref().and_then(as_string),
            assigned_to: take("System.AssignedTo").as_ref().and_then(identity),
            story_points: take("Microsoft.VSTS.Scheduling.StoryPoints")
                .as_ref()
                .and_then(as_f64),
            effort: take("Microsoft.VSTS.Scheduling.Effort").as_ref().and_then(as_f64),
            created_date: take("System.CreatedDate")
                .as_ref()
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
            parent: take("System.Parent")
                .as_ref()
                .and_then(as_i64)
                .and_then(|p| u64::try_from(p).ok()),
            extra: Default::default(),
        };
        fields.extra = raw.into_iter().collect();

        let relations = wire
            .relations
            .iter()
            .filter_map(|r| {
                Some(Relation {
                    kind: RelationKind::from_wire(&r.rel),
                    target_id: r.target_id()?,
                })
            })
            .collect();

        WorkItem {
            id: wire.id,
            fields,
            relations,
            relationship: None,
        }
    }
}

impl From<WireUpdate> for Revision {
    fn from(wire: WireUpdate) -> Self {
        let changed_by = wire
            .revised_by
            .as_ref()
            .map(value_text)
            .unwrap_or_default();

        let changed_date = wire
            .fields
            .get(CHANGED_DATE_FIELD)
            .and_then(|f| f.get("newValue"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let changed_at = changed_date
            .or(wire.revised_date)
            .unwrap_or_default();

        let comment = wire
            .fields
            .get(HISTORY_FIELD)
            .and_then(|f| f.get("newValue"))
            .map(value_text)
            .filter(|c| !c.trim().is_empty());

        let field_changes = wire
            .fields
            .iter()
            .map(|(name, change)| {
                let side = |key: &str| change.get(key).map(value_text).unwrap_or_default();
                (name.clone(), FieldChange::new(side("oldValue"), side("newValue")))
            })
            .collect();

        Revision {
            sequence: wire.rev.unwrap_or(wire.id),
            changed_by,
            changed_at,
            field_changes,
            comment,
        }
    }
}
