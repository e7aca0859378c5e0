//! Tunables for every pipeline stage.
//!
//! Built once at startup and handed to component constructors. All
//! sections deserialize from TOML with per-field defaults, so a config file
//! only needs to name the values it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard cap on the assembled context, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 120_000;
/// Cap applied to each free-text field before assembly, in characters.
pub const DEFAULT_FIELD_LIMIT: usize = 15_000;
/// Upper bound on `retry.max_attempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 20;
/// Longest single delay between attempts; backoff saturates here.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);
/// Linked items listed per relationship group before eliding the rest.
pub const DEFAULT_MAX_LINKED_PER_GROUP: usize = 8;
/// Trailing revisions scanned for state changes.
pub const DEFAULT_TIMELINE_SCAN: usize = 15;
/// State changes shown in the timeline.
pub const DEFAULT_TIMELINE_SHOWN: usize = 5;
/// Recency window for the activity feed, in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 90;
/// Activity lines kept after windowing.
pub const DEFAULT_MAX_HISTORY_LINES: usize = 15;

/// Context Assembler limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_context_chars: usize,
    pub field_limit: usize,
    pub max_linked_per_group: usize,
    pub timeline_scan: usize,
    pub timeline_shown: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            field_limit: DEFAULT_FIELD_LIMIT,
            max_linked_per_group: DEFAULT_MAX_LINKED_PER_GROUP,
            timeline_scan: DEFAULT_TIMELINE_SCAN,
            timeline_shown: DEFAULT_TIMELINE_SHOWN,
        }
    }
}

/// History Filter window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub window_days: i64,
    pub max_lines: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_lines: DEFAULT_MAX_HISTORY_LINES,
        }
    }
}

/// Sampling parameters sent with every generation call.
///
/// Near-zero temperature and narrow sampling keep summaries reproducible;
/// `num_predict` is sized so the last template section is not cut off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.8,
            top_k: 10,
            repeat_penalty: 1.1,
            num_predict: 1200,
        }
    }
}

/// Retry Controller policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds.
    pub initial_delay_secs: f64,
    /// Multiplier applied after a connection-type failure.
    pub connection_backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_secs: 10.0,
            connection_backoff: 1.5,
        }
    }
}

impl RetryPolicy {
    /// First delay, clamped to [`MAX_RETRY_DELAY`]. Never panics.
    pub fn initial_delay(&self) -> Duration {
        saturating_secs(self.initial_delay_secs)
    }

    /// Delay after a connection failure that followed `delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        saturating_secs(delay.as_secs_f64() * self.connection_backoff)
    }
}

fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
}

/// Everything the pipeline needs, in one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub context: ContextConfig,
    pub history: HistoryConfig,
    pub generation: GenerationOptions,
    pub retry: RetryPolicy,
    /// Input cap enforced by the generation driver itself.
    pub max_input_chars: Option<usize>,
}

impl PipelineConfig {
    /// Driver input cap; falls back to the context cap.
    pub fn driver_input_limit(&self) -> usize {
        self.max_input_chars
            .unwrap_or(self.context.max_context_chars)
    }

    /// Validate all sections; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.context.max_context_chars == 0 {
            return Err("context.max_context_chars must be > 0".to_string());
        }
        if self.context.field_limit == 0 {
            return Err("context.field_limit must be > 0".to_string());
        }
        if self.history.window_days < 0 {
            return Err(format!(
                "history.window_days must be >= 0, got {}",
                self.history.window_days
            ));
        }
        if !(1..=MAX_RETRY_ATTEMPTS).contains(&self.retry.max_attempts) {
            return Err(format!(
                "retry.max_attempts must be in [1, {MAX_RETRY_ATTEMPTS}], got {}",
                self.retry.max_attempts
            ));
        }
        let max_delay_secs = MAX_RETRY_DELAY.as_secs_f64();
        if !(0.0..=max_delay_secs).contains(&self.retry.initial_delay_secs) {
            return Err(format!(
                "retry.initial_delay_secs must be in [0, {max_delay_secs}], got {}",
                self.retry.initial_delay_secs
            ));
        }
        if !(1.0..=10.0).contains(&self.retry.connection_backoff) {
            return Err(format!(
                "retry.connection_backoff must be in [1, 10], got {}",
                self.retry.connection_backoff
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(format!(
                "generation.temperature must be in [0, 2], got {}",
                self.generation.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(format!(
                "generation.top_p must be in [0, 1], got {}",
                self.generation.top_p
            ));
        }
        Ok(())
    }
}
