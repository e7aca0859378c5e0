//! Work Item Digest Pipeline
//!
//! Deterministic core of the digest tool. Given a work item, its linked
//! items and its revision history, this library:
//! - cleans tracker markup and bounds free text (`cleaner`)
//! - reduces history to a recent activity feed (`history`)
//! - assembles a size-bounded model context (`context`)
//! - makes one summary call and checks the result (`driver`)
//! - retries failed calls with connection backoff, aborting when exhausted (`retry`)
//! - renders summaries into a markdown report (`report`)
//!
//! # Flow
//!
//! ```text
//! WorkItemSource ──▶ ContextAssembler ──▶ RetryController ──▶ ReportFormatter
//!  (item, links,      (Cleaner,             └─ SummaryDriver     └─ Report
//!   history)           HistoryFilter)           └─ GenerationBackend
//! ```
//!
//! No network code lives here. Trackers and model servers plug in through
//! [`WorkItemSource`] and [`GenerationBackend`]; the `testing` module
//! (cargo feature `testing`) has in-memory versions of both.

pub mod cleaner;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod history;
pub mod model;
pub mod progress;
pub mod report;
pub mod retry;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ContextConfig, GenerationOptions, HistoryConfig, PipelineConfig, RetryPolicy};
pub use context::{ContextAssembler, ContextSection, SectionKind};
pub use driver::{GenerationBackend, SummaryDriver, SummaryResult, SYSTEM_PROMPT};
pub use error::{FatalError, FetchError, FormattingError, GenerationError};
pub use history::HistoryFilter;
pub use model::{Identity, Relation, RelationKind, Revision, WorkItem, WorkItemFields};
pub use progress::ProgressTracker;
pub use report::{format_report, FormattedBlock, Report, ReportFormatter};
pub use retry::{RetryController, RetryOutcome, RetryState};
pub use source::WorkItemSource;
