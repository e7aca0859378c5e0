//! Domain types shared by every pipeline stage.

pub mod revision;
pub mod work_item;

pub use revision::{parse_timestamp, FieldChange, Revision, HISTORY_FIELD, STATE_FIELD};
pub use work_item::{Identity, Relation, RelationKind, WorkItem, WorkItemFields};
