//! Revision history entries.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracker field holding discussion comments. It is surfaced as
/// [`Revision::comment`] and never rendered as a field change.
pub const HISTORY_FIELD: &str = "System.History";

/// Tracker field holding the workflow state.
pub const STATE_FIELD: &str = "System.State";

/// Old/new pair for one field touched by a revision, already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: String,
    pub new: String,
}

impl FieldChange {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

/// One recorded change event on a work item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub sequence: u64,
    pub changed_by: String,
    /// Timestamp exactly as the tracker sent it.
    pub changed_at: String,
    pub field_changes: BTreeMap<String, FieldChange>,
    pub comment: Option<String>,
}

impl Revision {
    pub fn new(sequence: u64, changed_by: impl Into<String>, changed_at: impl Into<String>) -> Self {
        Self {
            sequence,
            changed_by: changed_by.into(),
            changed_at: changed_at.into(),
            ..Default::default()
        }
    }

    pub fn with_change(
        mut self,
        field: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        self.field_changes
            .insert(field.into(), FieldChange::new(old, new));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Parsed timestamp, or `None` when the raw value is not a recognizable date.
    pub fn changed_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.changed_at)
    }

    /// The state transition recorded by this revision, if any.
    pub fn state_change(&self) -> Option<&FieldChange> {
        self.field_changes.get(STATE_FIELD)
    }
}

/// Parse RFC 3339 (`2024-01-15T10:30:45.123Z`) and the naive ISO forms the
/// tracker occasionally emits. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
