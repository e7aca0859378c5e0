//! Sequential digest loop: fetch → assemble → generate (with retries) → format.
//!
//! Items are processed one at a time in the order given. Fetch and
//! formatting failures degrade the affected item only; exhausting the
//! retry budget for any item aborts the whole run and no report is
//! produced.

use std::time::Instant;

use chrono::Local;
use tracing::{error, info, warn};

use pipeline::{
    ContextAssembler, FatalError, FormattedBlock, GenerationBackend, HistoryFilter, PipelineConfig,
    ProgressTracker, Report, ReportFormatter, RetryController, SummaryDriver, WorkItem,
    WorkItemSource,
};

pub struct Orchestrator<S, B> {
    source: S,
    driver: SummaryDriver<B>,
    assembler: ContextAssembler,
    retry: RetryController,
    formatter: ReportFormatter,
}

impl<S: WorkItemSource, B: GenerationBackend> Orchestrator<S, B> {
    pub fn new(source: S, backend: B, config: &PipelineConfig) -> Self {
        Self {
            source,
            driver: SummaryDriver::from_config(backend, config),
            assembler: ContextAssembler::new(
                config.context.clone(),
                HistoryFilter::new(config.history.clone()),
            ),
            retry: RetryController::new(config.retry.clone()),
            formatter: ReportFormatter::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn backend(&self) -> &B {
        self.driver.backend()
    }

    /// Process every id and render the markdown report.
    pub async fn run(&self, ids: &[u64]) -> Result<String, FatalError> {
        Ok(self.run_report(ids).await?.render())
    }

    /// Process every id, returning the report before rendering.
    pub async fn run_report(&self, ids: &[u64]) -> Result<Report, FatalError> {
        let total = ids.len();
        info!(total, "processing work items in the given order");

        let started = Instant::now();
        let mut progress = ProgressTracker::new(total);
        let mut blocks = Vec::with_capacity(total);

        for (idx, &id) in ids.iter().enumerate() {
            let item_started = Instant::now();
            let block = self.process_item(id, idx + 1, total).await?;
            blocks.push(block);

            progress.record(item_started.elapsed());
            if let Some(estimate) = progress.estimate_remaining() {
                info!(
                    remaining = progress.remaining(),
                    estimate_minutes = estimate.as_secs_f64() / 60.0,
                    "estimated time remaining"
                );
            }
        }

        Ok(Report::new(blocks, Local::now(), started.elapsed()))
    }

    async fn process_item(
        &self,
        id: u64,
        position: usize,
        total: usize,
    ) -> Result<FormattedBlock, FatalError> {
        let item = match self.source.fetch_item(id).await {
            Ok(item) => item,
            Err(e) => {
                error!(id, error = %e, "failed to fetch work item, using placeholder");
                WorkItem::placeholder(id)
            }
        };
        info!(id, position, total, title = %item.title(), "processing work item");

        let linked = self.source.fetch_linked_items(id).await.unwrap_or_else(|e| {
            warn!(id, error = %e, "failed to fetch linked items");
            Vec::new()
        });
        let history = self.source.fetch_history(id).await.unwrap_or_else(|e| {
            error!(id, error = %e, "failed to fetch history");
            Vec::new()
        });

        let context = self.assembler.build(&item, &linked, &history);
        info!(
            id,
            linked = linked.len(),
            revisions = history.len(),
            context_chars = context.chars().count(),
            "context assembled"
        );

        let generation_started = Instant::now();
        let outcome = self
            .retry
            .run(id, |_| self.driver.generate_summary(&context))
            .await?;
        info!(
            id,
            attempts = outcome.attempts,
            truncated = outcome.value.truncated,
            elapsed_secs = generation_started.elapsed().as_secs_f64(),
            "summary ready"
        );

        Ok(self
            .formatter
            .render_summary(&outcome.value, id, item.title()))
    }
}
