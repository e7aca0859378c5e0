//! Report Formatter — markdown blocks per item and the final document.
//!
//! Model output is normalized line by line:
//!
//! | Input line                         | Output                          |
//! |------------------------------------|---------------------------------|
//! | blank, or template leakage         | dropped                         |
//! | `**Known Section**`                | `## Known Section`              |
//! | `**Anything Else**`                | dropped                         |
//! | before the first known section     | dropped                         |
//! | `•`, `-` or `*` bullet             | `- text`                        |
//! | `field: value` in *Key Details*    | `- **field**: value`            |
//! | longer than 90 chars               | wrapped at word boundaries      |
//! | truncation notice                  | moved below the body, italic    |

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::warn;

use crate::driver::{SummaryResult, TRUNCATION_NOTICE};
use crate::error::FormattingError;

/// Substrings that mark a line as echoed prompt text.
const INSTRUCTION_ARTIFACTS: &[&str] = &[
    "STRICT RULES:",
    "OUTPUT FORMAT",
    "RULES:",
    "Use ONLY",
    "exact field values",
    "Copy field values",
    "No assumptions",
    "[exact ID]",
    "[exact type]",
    "[exact state]",
    "[Copy description",
    "based on title and description only",
];

/// Section names promoted to headings, compared lowercase.
const KNOWN_SECTIONS: &[&str] = &[
    "executive summary",
    "key details",
    "description",
    "acceptance criteria",
    "technical details",
    "next actions",
    "dependencies",
    "risks",
    "dependencies & risks",
];

const KEY_DETAILS: &str = "key details";

/// Values in *Key Details* that mean "nothing here".
const PLACEHOLDER_VALUES: &[&str] = &["Not specified", "Not provided"];

pub const WRAP_WIDTH: usize = 90;

/// Marks a block whose summary could not be formatted.
pub const FAILURE_MARKER: &str = "❌";

static TITLE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\s*").expect("TITLE_PREFIX_RE regex should compile")
});

static EXACT_PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[exact [^\]]+\]").expect("EXACT_PLACEHOLDER_RE regex should compile")
});

// ── Blocks ────────────────────────────────────────────────────────────────────

/// One item's rendered markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedBlock {
    pub item_id: u64,
    pub text: String,
    /// False when the block is a fallback.
    pub success: bool,
}

/// Drop bracketed prefixes such as `[P0]` or `[Backend]` from a title.
pub fn clean_title(title: &str) -> String {
    TITLE_PREFIX_RE.replace_all(title, "").trim().to_string()
}

fn is_instruction_artifact(line: &str) -> bool {
    INSTRUCTION_ARTIFACTS.iter().any(|a| line.contains(a))
}

/// Section name of a `**Name**` line, if it is one.
fn bold_heading(line: &str) -> Option<&str> {
    if line.len() >= 4 && line.starts_with("**") && line.ends_with("**") {
        Some(line.trim_matches('*').trim())
    } else {
        None
    }
}

fn is_known_section(name: &str) -> bool {
    KNOWN_SECTIONS.contains(&name.to_lowercase().as_str())
}

/// Content of a bullet line with its marker removed.
fn bullet_content(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix('•')
        .or_else(|| line.strip_prefix('-'))
        .or_else(|| line.strip_prefix("* "))?;
    Some(rest.trim_start_matches(['•', '-', ' ']).trim())
}

fn key_detail(content: &str) -> Option<String> {
    let (field, value) = content.split_once(':')?;
    let field = field.trim().trim_matches('*').trim();
    let value = EXACT_PLACEHOLDER_RE.replace_all(value, "");
    let value = value.trim();
    if value.is_empty() || PLACEHOLDER_VALUES.contains(&value) {
        Some(format!("- **{field}**: Not specified"))
    } else {
        Some(format!("- **{field}**: {value}"))
    }
}

/// Greedy word wrap; words longer than `width` get a line of their own.
pub fn wrap(line: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in line.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

fn format_content(line: &str, section: &str) -> Option<String> {
    let bullet = bullet_content(line);

    if section == KEY_DETAILS {
        let content = bullet.unwrap_or(line);
        if content.contains(':') {
            return key_detail(content);
        }
        return bullet.filter(|c| !c.is_empty()).map(|c| format!("- {c}"));
    }

    if let Some(content) = bullet {
        return (!content.is_empty()).then(|| format!("- {content}"));
    }

    if line.chars().count() > WRAP_WIDTH {
        Some(wrap(line, WRAP_WIDTH))
    } else {
        Some(line.to_string())
    }
}

/// Turns raw summaries into report blocks.
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Normalized markdown body for one summary.
    pub fn format_body(&self, summary: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut section: Option<String> = None;

        for line in summary.lines().map(str::trim) {
            if line.is_empty() || line == TRUNCATION_NOTICE || is_instruction_artifact(line) {
                continue;
            }

            if let Some(name) = bold_heading(line) {
                if is_known_section(name) {
                    if out.last().is_some_and(|l| !l.is_empty()) {
                        out.push(String::new());
                    }
                    out.push(format!("## {name}"));
                    out.push(String::new());
                    section = Some(name.to_lowercase());
                }
                continue;
            }

            if let Some(current) = section.as_deref() {
                if let Some(formatted) = format_content(line, current) {
                    out.push(formatted);
                }
            }
        }

        out.join("\n").trim_end().to_string()
    }

    /// Full block for one item: header, body and separator.
    ///
    /// A truncation notice in `summary` is carried below the body.
    pub fn format_item(
        &self,
        summary: &str,
        item_id: u64,
        title: &str,
    ) -> Result<String, FormattingError> {
        self.format_block(summary, item_id, title, false)
    }

    fn format_block(
        &self,
        summary: &str,
        item_id: u64,
        title: &str,
        truncated: bool,
    ) -> Result<String, FormattingError> {
        let body = self.format_body(summary);
        if body.is_empty() {
            return Err(FormattingError::EmptyBody { item_id });
        }
        let truncated = truncated || summary.lines().any(|l| l.trim() == TRUNCATION_NOTICE);
        let notice = if truncated {
            format!("\n\n*{TRUNCATION_NOTICE}*")
        } else {
            String::new()
        };
        Ok(format!(
            "# Work Item {item_id}: {}\n\n{body}{notice}\n\n---\n\n",
            clean_title(title)
        ))
    }

    /// [`format_item`](Self::format_item), degrading to [`fallback_block`](Self::fallback_block).
    pub fn render(&self, summary: &str, item_id: u64, title: &str) -> FormattedBlock {
        self.render_block(summary, item_id, title, false)
    }

    /// Like [`render`](Self::render), keeping the notice whenever the
    /// driver flagged the summary as truncated.
    pub fn render_summary(
        &self,
        summary: &SummaryResult,
        item_id: u64,
        title: &str,
    ) -> FormattedBlock {
        self.render_block(&summary.text, item_id, title, summary.truncated)
    }

    fn render_block(
        &self,
        summary: &str,
        item_id: u64,
        title: &str,
        truncated: bool,
    ) -> FormattedBlock {
        match self.format_block(summary, item_id, title, truncated) {
            Ok(text) => FormattedBlock {
                item_id,
                text,
                success: true,
            },
            Err(err) => {
                warn!(item_id, error = %err, "formatting failed, keeping raw summary");
                self.fallback_block(summary, item_id, title, &err)
            }
        }
    }

    /// Raw summary under a plain header, followed by a visible error note.
    pub fn fallback_block(
        &self,
        summary: &str,
        item_id: u64,
        title: &str,
        err: &FormattingError,
    ) -> FormattedBlock {
        let text = format!(
            "# Work Item {item_id}: {title}\n\n\
             {summary}\n\n\
             {FAILURE_MARKER} **ERROR FORMATTING WORK ITEM SUMMARY**\n\n\
             Formatting failed: {err}\n\n---\n\n",
            summary = summary.trim(),
        );
        FormattedBlock {
            item_id,
            text,
            success: false,
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// The finished document's contents and counters.
#[derive(Debug, Clone)]
pub struct Report {
    blocks: Vec<FormattedBlock>,
    generated_at: DateTime<Local>,
    elapsed: Duration,
}

impl Report {
    pub fn new(
        blocks: Vec<FormattedBlock>,
        generated_at: DateTime<Local>,
        elapsed: Duration,
    ) -> Self {
        Self {
            blocks,
            generated_at,
            elapsed,
        }
    }

    pub fn blocks(&self) -> &[FormattedBlock] {
        &self.blocks
    }

    pub fn items_processed(&self) -> usize {
        self.blocks.len()
    }

    pub fn success_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.success).count()
    }

    pub fn total_elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "# ADO Work Items Summary Report\n\
             *Generated on {}*\n\
             \n\
             **Items Processed**: {}  \n\
             **Success Rate**: {}/{}  \n\
             **Total Time**: {:.1} minutes\n\
             \n\
             ---\n\
             \n",
            self.generated_at.format("%Y-%m-%d at %H:%M:%S"),
            self.items_processed(),
            self.success_count(),
            self.items_processed(),
            self.total_elapsed_seconds() / 60.0,
        );
        for block in &self.blocks {
            out.push_str(&block.text);
        }
        out.push_str("\n---\n\n*End of Report*\n");
        out
    }
}

/// Render the final document from completed blocks.
pub fn format_report(
    blocks: Vec<FormattedBlock>,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
) -> String {
    let elapsed = (finished_at - started_at).to_std().unwrap_or_default();
    Report::new(blocks, finished_at, elapsed).render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SUMMARY: &str = "\
Here is the summary you asked for.

**EXECUTIVE SUMMARY**
Fixes the login flow for SSO users.

**KEY DETAILS**
• Work Item ID: [exact ID]
• Work Item ID: 42
• Type: Bug
• Priority: Not specified
• Iteration: [exact iteration or \"Not specified\"]
• Assigned To:

**NOTES FROM THE MODEL**
this should vanish

**NEXT ACTIONS**
- Patch the token refresh
* Add a regression test

STRICT RULES:
1. Use ONLY information explicitly provided in context";

    fn at(hour: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, hour, min, 0).unwrap()
    }

    fn block(id: u64, success: bool) -> FormattedBlock {
        FormattedBlock {
            item_id: id,
            text: format!("# Work Item {id}: t\n\nbody\n\n---\n\n"),
            success,
        }
    }

    #[test]
    fn title_prefixes_are_removed() {
        assert_eq!(clean_title("[P0] Fix login"), "Fix login");
        assert_eq!(clean_title("[P0] [Auth]  Fix login "), "Fix login");
        assert_eq!(clean_title("Plain"), "Plain");
    }

    #[test]
    fn body_keeps_only_known_sections() {
        let body = ReportFormatter::new().format_body(SUMMARY);
        assert_eq!(
            body,
            "## EXECUTIVE SUMMARY\n\
             \n\
             Fixes the login flow for SSO users.\n\
             \n\
             ## KEY DETAILS\n\
             \n\
             - **Work Item ID**: 42\n\
             - **Type**: Bug\n\
             - **Priority**: Not specified\n\
             - **Iteration**: Not specified\n\
             - **Assigned To**: Not specified\n\
             \n\
             ## NEXT ACTIONS\n\
             \n\
             - Patch the token refresh\n\
             - Add a regression test"
        );
    }

    #[test]
    fn block_has_header_and_separator() {
        let block = ReportFormatter::new()
            .format_item(SUMMARY, 42, "[P0] Fix login")
            .unwrap();
        assert!(block.starts_with("# Work Item 42: Fix login\n\n## EXECUTIVE SUMMARY"));
        assert!(block.ends_with("\n\n---\n\n"));
    }

    #[test]
    fn long_prose_is_wrapped_without_breaking_words() {
        let long = format!("**DESCRIPTION**\n{}", "lorem ipsum ".repeat(20));
        let body = ReportFormatter::new().format_body(&long);
        let lines: Vec<&str> = body.lines().skip(2).collect();
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= WRAP_WIDTH);
            assert!(!line.starts_with(' ') && !line.ends_with(' '));
        }
        assert_eq!(lines.join(" "), "lorem ipsum ".repeat(20).trim());
    }

    #[test]
    fn overlong_word_is_kept_whole() {
        let word = "x".repeat(120);
        assert_eq!(wrap(&format!("a {word} b"), 90), format!("a\n{word}\nb"));
    }

    #[test]
    fn list_lines_are_not_wrapped() {
        let long = format!("**NEXT ACTIONS**\n- {}", "step ".repeat(30));
        let body = ReportFormatter::new().format_body(&long);
        assert_eq!(body.lines().count(), 3);
    }

    #[test]
    fn summary_without_sections_is_a_formatting_error() {
        let err = ReportFormatter::new()
            .format_item("just some prose\n**RANDOM**\nmore", 9, "t")
            .unwrap_err();
        assert!(matches!(err, FormattingError::EmptyBody { item_id: 9 }));
    }

    #[test]
    fn truncation_notice_survives_a_cut_in_key_details() {
        let text = format!(
            "**EXECUTIVE SUMMARY**\nFixes login.\n\n**KEY DETAILS**\n{TRUNCATION_NOTICE}"
        );
        let block = ReportFormatter::new().render_summary(
            &SummaryResult {
                text,
                truncated: true,
            },
            42,
            "Fix login",
        );
        assert!(block.success);
        assert!(block.text.contains("## KEY DETAILS"));
        assert!(block
            .text
            .ends_with(&format!("*{TRUNCATION_NOTICE}*\n\n---\n\n")));
        assert_eq!(block.text.matches(TRUNCATION_NOTICE).count(), 1);
    }

    #[test]
    fn truncated_flag_adds_notice_even_without_the_line() {
        let block = ReportFormatter::new().render_summary(
            &SummaryResult {
                text: "**NEXT ACTIONS**\n- Ship it".to_string(),
                truncated: true,
            },
            1,
            "t",
        );
        assert!(block.text.contains(TRUNCATION_NOTICE));

        let plain = ReportFormatter::new().render("**NEXT ACTIONS**\n- Ship it", 1, "t");
        assert!(!plain.text.contains(TRUNCATION_NOTICE));
    }

    #[test]
    fn fallback_keeps_raw_summary_and_marks_failure() {
        let block = ReportFormatter::new().render("just some prose", 9, "[X] Title");
        assert!(!block.success);
        assert!(block.text.contains("just some prose"));
        assert!(block.text.contains(FAILURE_MARKER));
        assert!(block.text.starts_with("# Work Item 9: [X] Title"));
    }

    #[test]
    fn report_counts_successes_from_flags() {
        let report = format_report(vec![block(1, true), block(2, false)], at(9, 0), at(9, 3));
        assert!(report.starts_with(
            "# ADO Work Items Summary Report\n*Generated on 2024-06-01 at 09:03:00*\n"
        ));
        assert!(report.contains("**Items Processed**: 2  \n"));
        assert!(report.contains("**Success Rate**: 1/2  \n"));
        assert!(report.contains("**Total Time**: 3.0 minutes\n"));
        assert!(report.ends_with("---\n\n*End of Report*\n"));
        assert!(report.find("# Work Item 1").unwrap() < report.find("# Work Item 2").unwrap());
    }

    #[test]
    fn marker_text_in_a_successful_block_does_not_count_as_failure() {
        let mut ok = block(1, true);
        ok.text.push_str("the model wrote ❌ here\n");
        let report = Report::new(vec![ok], at(9, 0), Duration::from_secs(30));
        assert_eq!(report.success_count(), 1);
        assert!(report.render().contains("**Success Rate**: 1/1"));
    }

    #[test]
    fn empty_report_still_renders() {
        let report = format_report(Vec::new(), at(9, 0), at(9, 0));
        assert!(report.contains("**Success Rate**: 0/0"));
        assert!(report.contains("*End of Report*"));
    }
}
