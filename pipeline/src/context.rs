//! Context Assembler — the bounded text handed to the model for one item.
//!
//! Sections are emitted in a fixed order and joined with blank lines:
//!
//! ```text
//! PRIMARY WORK ITEM       always
//! BUSINESS CONTEXT        always
//! TECHNICAL DETAILS       always
//! RELATED ITEMS           only with linked items
//! TIMELINE                only with history
//! ```
//!
//! Every field is truncated on its own before assembly; only description
//! and acceptance criteria are stripped of markup first.
//! The joined text is hard-cut to `max_context_chars` only as a last
//! resort, and that cut is logged.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cleaner;
use crate::config::ContextConfig;
use crate::history::HistoryFilter;
use crate::model::{Revision, WorkItem};

const SECTION_SEPARATOR: &str = "\n\n";

/// Which part of the context a section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Primary,
    Business,
    Technical,
    Relationships,
    Timeline,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Business => write!(f, "business"),
            Self::Technical => write!(f, "technical"),
            Self::Relationships => write!(f, "relationships"),
            Self::Timeline => write!(f, "timeline"),
        }
    }
}

/// One rendered section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub text: String,
}

impl ContextSection {
    fn new(kind: SectionKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Builds per-item contexts.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: ContextConfig,
    history: HistoryFilter,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig, history: HistoryFilter) -> Self {
        Self { config, history }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Assemble the context for `primary` as of now.
    pub fn build(&self, primary: &WorkItem, linked: &[WorkItem], history: &[Revision]) -> String {
        self.build_at(primary, linked, history, Utc::now())
    }

    /// Assemble the context with an explicit clock for the history window.
    pub fn build_at(
        &self,
        primary: &WorkItem,
        linked: &[WorkItem],
        history: &[Revision],
        now: DateTime<Utc>,
    ) -> String {
        let joined = self
            .sections(primary, linked, history, now)
            .into_iter()
            .map(|s| s.text)
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);

        let (context, cut) = cleaner::hard_truncate(&joined, self.config.max_context_chars);
        if cut {
            warn!(
                item_id = primary.id,
                original_chars = joined.chars().count(),
                max_chars = self.config.max_context_chars,
                "context truncated"
            );
        }
        debug!(item_id = primary.id, chars = context.chars().count(), "context assembled");
        context
    }

    /// The individual sections, in output order, before the global cap.
    pub fn sections(
        &self,
        primary: &WorkItem,
        linked: &[WorkItem],
        history: &[Revision],
        now: DateTime<Utc>,
    ) -> Vec<ContextSection> {
        let mut sections = vec![
            ContextSection::new(SectionKind::Primary, self.primary_section(primary)),
            ContextSection::new(SectionKind::Business, self.business_section(primary)),
            ContextSection::new(SectionKind::Technical, self.technical_section(primary)),
        ];
        if !linked.is_empty() {
            sections.push(ContextSection::new(
                SectionKind::Relationships,
                self.relationship_section(linked),
            ));
        }
        if !history.is_empty() {
            sections.push(ContextSection::new(
                SectionKind::Timeline,
                self.timeline_section(history, now),
            ));
        }
        sections
    }

    /// Plain-text field: length-bounded only, so `Vec<T>` survives.
    fn field(&self, value: Option<&str>, fallback: &str) -> String {
        let text = value
            .map(|v| cleaner::truncate(v.trim(), self.config.field_limit))
            .unwrap_or_default();
        or_fallback(text, fallback)
    }

    /// Rich-text field: markup stripped, then length-bounded.
    fn markup_field(&self, value: Option<&str>, fallback: &str) -> String {
        let cleaned = value
            .map(|v| cleaner::clean_and_truncate(v, self.config.field_limit))
            .unwrap_or_default();
        or_fallback(cleaned, fallback)
    }

    fn primary_section(&self, item: &WorkItem) -> String {
        let f = &item.fields;
        let priority = f
            .priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "Not Set".to_string());

        format!(
            "PRIMARY WORK ITEM:\n\
             ID: {id}\n\
             Title: {title}\n\
             Type: {kind}\n\
             State: {state}\n\
             Priority: {priority}\n\
             Area: {area}\n\
             \n\
             DESCRIPTION:\n\
             {description}\n\
             \n\
             ACCEPTANCE CRITERIA:\n\
             {criteria}",
            id = item.id,
            title = self.field(f.title.as_deref(), ""),
            kind = self.field(f.work_item_type.as_deref(), ""),
            state = self.field(f.state.as_deref(), ""),
            area = self.field(f.area_path.as_deref(), ""),
            description = self.markup_field(f.description.as_deref(), "No description"),
            criteria = self.markup_field(f.acceptance_criteria.as_deref(), "Not specified"),
        )
    }

    fn business_section(&self, item: &WorkItem) -> String {
        let f = &item.fields;
        let business_value = f
            .business_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "Not quantified".to_string());
        let assignee = f
            .assigned_to
            .as_ref()
            .map(|who| who.display_name.as_str());

        format!(
            "BUSINESS CONTEXT:\n\
             Business Value: {business_value}\n\
             Tags: {tags}\n\
             Iteration: {iteration}\n\
             Assigned To: {assignee}",
            tags = self.field(f.tags.as_deref(), "None"),
            iteration = self.field(f.iteration_path.as_deref(), "Not assigned"),
            assignee = self.field(assignee, "Unassigned"),
        )
    }

    fn technical_section(&self, item: &WorkItem) -> String {
        let f = &item.fields;
        let estimate = |v: Option<f64>| {
            v.map(|n| n.to_string())
                .unwrap_or_else(|| "Not estimated".to_string())
        };

        format!(
            "TECHNICAL DETAILS:\n\
             Story Points: {}\n\
             Effort: {}\n\
             Reason: {}",
            estimate(f.story_points),
            estimate(f.effort),
            self.field(f.reason.as_deref(), "Standard"),
        )
    }

    fn relationship_section(&self, linked: &[WorkItem]) -> String {
        // Groups keep first-seen order.
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for item in linked {
            let label = item
                .relationship
                .as_ref()
                .map(|r| r.label().to_string())
                .unwrap_or_else(|| "Related".to_string());
            let entry = format!(
                "{} - {} ({})",
                item.id,
                self.field(item.fields.title.as_deref(), "Untitled"),
                self.field(item.fields.state.as_deref(), "Unknown"),
            );
            match groups.iter_mut().find(|(l, _)| *l == label) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((label, vec![entry])),
            }
        }

        let cap = self.config.max_linked_per_group;
        let mut lines = vec!["RELATED ITEMS:".to_string()];
        for (label, entries) in groups {
            lines.push(format!("{label}:"));
            lines.extend(entries.iter().take(cap).map(|e| format!("  - {e}")));
            if entries.len() > cap {
                lines.push(format!("  - ... and {} more", entries.len() - cap));
            }
        }
        lines.join("\n")
    }

    fn timeline_section(&self, history: &[Revision], now: DateTime<Utc>) -> String {
        let scan_from = history.len().saturating_sub(self.config.timeline_scan);
        let events: Vec<String> = history[scan_from..]
            .iter()
            .filter_map(|rev| {
                rev.state_change().map(|change| {
                    format!(
                        "{}: {} changed state from '{}' to '{}'",
                        rev.changed_at, rev.changed_by, change.old, change.new
                    )
                })
            })
            .collect();

        let state_changes = if events.is_empty() {
            "TIMELINE: No significant state changes".to_string()
        } else {
            let shown_from = events.len().saturating_sub(self.config.timeline_shown);
            format!("TIMELINE:\n{}", events[shown_from..].join("\n"))
        };

        format!(
            "{state_changes}\n\n{}",
            self.history.render_block(history, now)
        )
    }
}

fn or_fallback(text: String, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextConfig::default(), HistoryFilter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::model::{Identity, RelationKind, STATE_FIELD};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (now() - Duration::days(days)).to_rfc3339()
    }

    fn login_item() -> WorkItem {
        WorkItem::new(42)
            .with_title("[P0] Fix login")
            .with_state("Active")
    }

    #[test]
    fn bare_item_has_three_sections() {
        let assembler = ContextAssembler::default();
        let sections = assembler.sections(&login_item(), &[], &[], now());
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SectionKind::Primary, SectionKind::Business, SectionKind::Technical]
        );

        let text = assembler.build_at(&login_item(), &[], &[], now());
        assert_eq!(text.matches(SECTION_SEPARATOR).count(), 2 + 2); // 2 joins + 2 inside primary
        assert!(!text.contains("RELATED ITEMS"));
        assert!(!text.contains("TIMELINE"));
    }

    #[test]
    fn primary_section_uses_fallbacks() {
        let text = ContextAssembler::default().build_at(&login_item(), &[], &[], now());
        assert!(text.starts_with("PRIMARY WORK ITEM:\nID: 42\nTitle: [P0] Fix login\n"));
        assert!(text.contains("State: Active"));
        assert!(text.contains("Priority: Not Set"));
        assert!(text.contains("DESCRIPTION:\nNo description"));
        assert!(text.contains("ACCEPTANCE CRITERIA:\nNot specified"));
        assert!(text.contains("Business Value: Not quantified"));
        assert!(text.contains("Tags: None"));
        assert!(text.contains("Iteration: Not assigned"));
        assert!(text.contains("Assigned To: Unassigned"));
        assert!(text.contains("Story Points: Not estimated"));
        assert!(text.contains("Reason: Standard"));
    }

    #[test]
    fn populated_fields_are_cleaned() {
        let mut item = login_item();
        item.fields.description = Some("<p>Users&nbsp;cannot <b>sign in</b></p>".into());
        item.fields.priority = Some(1);
        item.fields.business_value = Some(300);
        item.fields.assigned_to = Some(Identity::new("Ana Silva"));
        item.fields.story_points = Some(5.0);
        item.fields.effort = Some(2.5);

        let text = ContextAssembler::default().build_at(&item, &[], &[], now());
        assert!(text.contains("DESCRIPTION:\nUsers cannot sign in"));
        assert!(text.contains("Priority: 1"));
        assert!(text.contains("Business Value: 300"));
        assert!(text.contains("Assigned To: Ana Silva"));
        assert!(text.contains("Story Points: 5\n"));
        assert!(text.contains("Effort: 2.5"));
    }

    #[test]
    fn plain_text_fields_keep_angle_brackets() {
        let item = WorkItem::new(1)
            .with_title("Support Vec<T> and Option<String> in parser")
            .with_state("<New>");
        let linked = [WorkItem::new(2)
            .with_title("Parse HashMap<K, V>")
            .with_relationship(RelationKind::Related)];

        let text = ContextAssembler::default().build_at(&item, &linked, &[], now());
        assert!(text.contains("Title: Support Vec<T> and Option<String> in parser\n"));
        assert!(text.contains("State: <New>\n"));
        assert!(text.contains("  - 2 - Parse HashMap<K, V> (Unknown)"));
    }

    #[test]
    fn long_description_is_cut_per_field() {
        let mut item = login_item();
        item.fields.description = Some("word ".repeat(100));
        let assembler = ContextAssembler::new(
            ContextConfig {
                field_limit: 50,
                ..Default::default()
            },
            HistoryFilter::default(),
        );
        let text = assembler.build_at(&item, &[], &[], now());
        let description = text
            .split("DESCRIPTION:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap();
        assert!(description.ends_with("..."));
        assert!(description.chars().count() <= 53);
    }

    #[test]
    fn linked_items_group_by_relationship_with_overflow() {
        let mut linked = Vec::new();
        for i in 0..10 {
            linked.push(
                WorkItem::new(100 + i)
                    .with_title(format!("Child {i}"))
                    .with_state("New")
                    .with_relationship(RelationKind::HierarchyForward),
            );
        }
        linked.push(
            WorkItem::new(7)
                .with_title("Epic")
                .with_relationship(RelationKind::HierarchyReverse),
        );

        let text = ContextAssembler::default().build_at(&login_item(), &linked, &[], now());
        let related = text.split("RELATED ITEMS:\n").nth(1).unwrap();
        let lines: Vec<&str> = related.lines().collect();
        assert_eq!(lines[0], "Child:");
        assert_eq!(lines[1], "  - 100 - Child 0 (New)");
        assert_eq!(lines[8], "  - 107 - Child 7 (New)");
        assert_eq!(lines[9], "  - ... and 2 more");
        assert_eq!(lines[10], "Parent:");
        assert_eq!(lines[11], "  - 7 - Epic (Unknown)");
    }

    #[test]
    fn timeline_shows_last_state_changes_and_recent_activity() {
        let mut history: Vec<Revision> = (0..7)
            .map(|i| Revision::new(i, "Old Timer", days_ago(300 - i as i64)).with_comment("old"))
            .collect();
        let transitions = [("New", "Active"), ("Active", "Resolved"), ("Resolved", "Closed")];
        for (i, (old, new)) in transitions.iter().enumerate() {
            history.push(
                Revision::new(7 + i as u64, "Ana", days_ago(30 - 10 * i as i64))
                    .with_change(STATE_FIELD, *old, *new),
            );
        }

        let assembler = ContextAssembler::new(
            ContextConfig {
                timeline_shown: 1,
                ..Default::default()
            },
            HistoryFilter::new(HistoryConfig::default()),
        );
        let sections = assembler.sections(&login_item(), &[], &history, now());
        let timeline = &sections.last().unwrap().text;
        assert_eq!(sections.last().unwrap().kind, SectionKind::Timeline);

        let state_lines: Vec<&str> = timeline
            .lines()
            .filter(|l| l.contains("changed state"))
            .collect();
        assert_eq!(state_lines.len(), 1);
        assert!(state_lines[0].ends_with("Ana changed state from 'Resolved' to 'Closed'"));

        let recent = timeline
            .split("Recent Activity (Last 90 Days):\n")
            .nth(1)
            .unwrap();
        assert_eq!(recent.lines().count(), 3);
    }

    #[test]
    fn timeline_without_state_changes_says_so() {
        let history = vec![Revision::new(1, "Ana", days_ago(400)).with_comment("ancient")];
        let sections = ContextAssembler::default().sections(&login_item(), &[], &history, now());
        let timeline = &sections.last().unwrap().text;
        assert!(timeline.starts_with("TIMELINE: No significant state changes"));
        assert!(timeline.ends_with("No recent updates found."));
    }

    #[test]
    fn oversized_context_is_hard_cut() {
        let mut item = login_item();
        item.fields.description = Some("x".repeat(5_000));
        let assembler = ContextAssembler::new(
            ContextConfig {
                max_context_chars: 1_000,
                ..Default::default()
            },
            HistoryFilter::default(),
        );
        let text = assembler.build_at(&item, &[], &[], now());
        assert_eq!(text.chars().count(), 1_000);
    }

    proptest! {
        #[test]
        fn output_never_exceeds_cap(
            description in "\\PC{0,400}",
            titles in proptest::collection::vec("[a-zA-Z ]{0,30}", 0..12),
            cap in 1usize..600,
        ) {
            let mut item = login_item();
            item.fields.description = Some(description);
            let linked: Vec<WorkItem> = titles
                .into_iter()
                .enumerate()
                .map(|(i, t)| WorkItem::new(i as u64).with_title(t).with_relationship(RelationKind::Related))
                .collect();
            let assembler = ContextAssembler::new(
                ContextConfig { max_context_chars: cap, ..Default::default() },
                HistoryFilter::default(),
            );
            let text = assembler.build_at(&item, &linked, &[], now());
            prop_assert!(text.chars().count() <= cap);
        }
    }
}
