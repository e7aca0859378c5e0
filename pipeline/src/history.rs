//! History Filter — recent, human-readable change lines.
//!
//! Reduces a revision list to the activity inside a recency window, one
//! line per revision that carries a comment or a real field change, capped
//! to the newest `max_lines` entries.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::cleaner;
use crate::config::HistoryConfig;
use crate::model::{Revision, HISTORY_FIELD};

/// Rendered in place of an empty activity feed.
pub const NO_RECENT_UPDATES: &str = "No recent updates found.";

/// Windowed, capped view over a revision list.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    config: HistoryConfig,
}

impl HistoryFilter {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    pub fn window_days(&self) -> i64 {
        self.config.window_days
    }

    /// Activity lines for revisions no older than the window, oldest first.
    ///
    /// Revisions whose timestamp cannot be parsed are kept rather than
    /// silently dropped.
    pub fn filter_recent(&self, history: &[Revision], now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::days(self.config.window_days);

        let lines: Vec<String> = history
            .iter()
            .filter(|rev| match rev.changed_at_utc() {
                Some(at) => at >= cutoff,
                None => {
                    warn!(
                        sequence = rev.sequence,
                        changed_at = %rev.changed_at,
                        "could not parse revision timestamp, keeping it"
                    );
                    true
                }
            })
            .filter_map(render_line)
            .collect();

        let skip = lines.len().saturating_sub(self.config.max_lines);
        lines.into_iter().skip(skip).collect()
    }

    /// Titled activity block for a context, with the sentinel when empty.
    pub fn render_block(&self, history: &[Revision], now: DateTime<Utc>) -> String {
        let header = format!("Recent Activity (Last {} Days):", self.config.window_days);
        let lines = self.filter_recent(history, now);
        if lines.is_empty() {
            format!("{header} {NO_RECENT_UPDATES}")
        } else {
            format!("{header}\n{}", lines.join("\n"))
        }
    }
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

/// `[timestamp] author: Comment: ... Changes: field: 'old' → 'new', ...`
fn render_line(rev: &Revision) -> Option<String> {
    let comment = rev
        .comment
        .as_deref()
        .map(cleaner::clean)
        .filter(|c| !c.is_empty());

    let changes: Vec<String> = rev
        .field_changes
        .iter()
        .filter(|(field, change)| field.as_str() != HISTORY_FIELD && !change.is_noop())
        .map(|(field, change)| format!("{field}: '{}' → '{}'", change.old, change.new))
        .collect();

    if comment.is_none() && changes.is_empty() {
        return None;
    }

    let mut line = format!("[{}] {}:", rev.changed_at, rev.changed_by);
    if let Some(comment) = comment {
        line.push_str(&format!(" Comment: {comment}"));
    }
    if !changes.is_empty() {
        line.push_str(&format!(" Changes: {}", changes.join(", ")));
    }
    Some(line)
}
