//! Generation Driver — one summary call per invocation.
//!
//! Bounds the context, sends it with the fixed system prompt and sampling
//! options, rejects empty output, and flags summaries that stop right at a
//! section heading. Retrying is not this module's job; see
//! [`crate::retry`].

use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::cleaner;
use crate::config::{GenerationOptions, PipelineConfig, DEFAULT_MAX_CONTEXT_CHARS};
use crate::error::GenerationError;

// ── Prompt ────────────────────────────────────────────────────────────────────

/// Instructions sent as the system message with every context.
pub const SYSTEM_PROMPT: &str = "\
You are a work item analyst. Extract and present ONLY the factual information provided. \
Do not make assumptions, extrapolate, or add interpretations.

OUTPUT FORMAT (use exact field values from context):

**EXECUTIVE SUMMARY**
Brief description of what this work item addresses based on title and description only.

**KEY DETAILS**
• Work Item ID: [exact ID]
• Type: [exact type]
• State: [exact state]
• Priority: [exact priority or \"Not specified\"]
• Business Value: [exact value or \"Not specified\"]
• Assigned To: [exact name or \"Unassigned\"]
• Area Path: [exact path]
• Iteration: [exact iteration or \"Not specified\"]
• Story Points: [exact points or \"Not estimated\"]

**DESCRIPTION**
[Copy description text exactly as provided, or \"No description provided\"]

**ACCEPTANCE CRITERIA**
[List exact criteria from context, or \"No acceptance criteria provided\"]

**TECHNICAL DETAILS**
[Extract any technical information from description/criteria, or \"No technical details provided\"]

**NEXT ACTIONS**
[Extract specific actions mentioned, or \"No specific actions identified\"]

**DEPENDENCIES & RISKS**
[Extract specific dependencies/blockers mentioned, or \"No dependencies identified\"]

STRICT RULES:
1. Use ONLY information explicitly provided in context
2. Copy field values exactly as they appear
3. If information is missing, state \"Not specified/provided\"
4. No assumptions, conversions, or extrapolations
5. Keep responses factual and concise";

/// A summary that ends on one of these stopped before the section body.
///
/// Matched with `ends_with`, so decorated headings (`⚠️ **RISKS & DEPENDENCIES**`)
/// match as well.
pub const TRUNCATION_MARKERS: &[&str] = &[
    "**RISKS & DEPENDENCIES**",
    "**EXECUTION PLAN**",
    "**EXPECTED IMPACT/ROI**",
    "**FUTURE STATE**",
    "**CURRENT STATE**",
    "**PROBLEM STATEMENT**",
    "**EXECUTIVE SUMMARY**",
    "**KEY DETAILS**",
    "**DESCRIPTION**",
    "**ACCEPTANCE CRITERIA**",
    "**TECHNICAL DETAILS**",
    "**NEXT ACTIONS**",
    "**DEPENDENCIES & RISKS**",
];

/// Appended on its own line to summaries that look cut off.
pub const TRUNCATION_NOTICE: &str = "[Summary truncated due to length limitations. \
Please review the full work item for complete details.]";

// ── Backend seam ──────────────────────────────────────────────────────────────

/// A text generation service.
///
/// Trait exists so the pipeline can be driven by a scripted stub in tests.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
impl<B: GenerationBackend + ?Sized> GenerationBackend for std::sync::Arc<B> {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        (**self).generate(system_prompt, context, options).await
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Summary text plus whether it was judged cut off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub text: String,
    pub truncated: bool,
}

/// Whether a trimmed summary stops on a heading or a dangling colon.
pub fn looks_truncated(summary: &str) -> bool {
    let trimmed = summary.trim_end();
    trimmed.ends_with(':') || TRUNCATION_MARKERS.iter().any(|m| trimmed.ends_with(m))
}

pub struct SummaryDriver<B> {
    backend: B,
    options: GenerationOptions,
    max_input_chars: usize,
    system_prompt: String,
}

impl<B: GenerationBackend> SummaryDriver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            options: GenerationOptions::default(),
            max_input_chars: DEFAULT_MAX_CONTEXT_CHARS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Driver wired with the generation options and input cap from `config`.
    pub fn from_config(backend: B, config: &PipelineConfig) -> Self {
        Self::new(backend)
            .with_options(config.generation.clone())
            .with_max_input_chars(config.driver_input_limit())
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Make exactly one generation call for `context`.
    pub async fn generate_summary(&self, context: &str) -> Result<SummaryResult, GenerationError> {
        let (input, cut) = cleaner::hard_truncate(context, self.max_input_chars);
        let input_chars = input.chars().count();
        if cut {
            warn!(
                original_chars = context.chars().count(),
                max_chars = self.max_input_chars,
                "context exceeds driver input limit, truncating"
            );
        }

        info!(chars = input_chars, "generating summary");
        let started = Instant::now();
        let raw = self
            .backend
            .generate(&self.system_prompt, &input, &self.options)
            .await?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        info!(
            chars = text.chars().count(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "summary generated"
        );

        if looks_truncated(text) {
            warn!("summary ends at a section heading, marking as truncated");
            return Ok(SummaryResult {
                text: format!("{text}\n{TRUNCATION_NOTICE}"),
                truncated: true,
            });
        }

        Ok(SummaryResult {
            text: text.to_string(),
            truncated: false,
        })
    }
}
