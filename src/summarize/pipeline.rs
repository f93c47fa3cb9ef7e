//! End-to-end summarization runs
//!
//! [`DocumentSummarizer`] validates the request, picks a strategy, sections
//! the text, runs the section processor and aggregates. Callers observe a run
//! through [`ProcessingEvent`]s: one `Starting`, `Progress` with
//! non-decreasing fractions, then exactly one `Success` or `Error`.

use super::aggregator::HierarchicalAggregator;
use super::cancel::CancelFlag;
use super::processor::SectionProcessor;
use super::retry::{tokio_sleeper, Sleeper};
use super::sectioner::{SectionBudget, Sectioner};
use super::strategy::{recommended_strategy, select_options};
use super::types::{
    AggregateSummary, ProcessingEvent, ProcessingOption, ProcessingStrategy, SummaryRequest,
};
use crate::ai::Summarizer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Share of the progress bar covered by section processing; the rest is aggregation
const SECTION_PHASE_SHARE: f64 = 0.9;

pub struct DocumentSummarizer {
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
    sectioner: Sectioner,
    sleeper: Sleeper,
}

impl DocumentSummarizer {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: PipelineConfig) -> Self {
        Self {
            summarizer,
            config,
            sectioner: Sectioner::default(),
            sleeper: tokio_sleeper(),
        }
    }

    pub fn with_sectioner(mut self, sectioner: Sectioner) -> Self {
        self.sectioner = sectioner;
        self
    }

    /// Replace the retry backoff sleep
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Strategies viable for `text`, exactly one of them recommended
    pub fn options(&self, text: &str) -> Vec<ProcessingOption> {
        select_options(text.chars().count())
    }

    /// Reject requests before any sectioning happens
    pub fn validate(&self, request: &SummaryRequest) -> Result<()> {
        let limits = &self.config.validation;
        let len = request.document.len();

        if request.document.is_blank() {
            return Err(PipelineError::validation("text is empty"));
        }
        if len < limits.min_text_length || len > limits.max_text_length {
            return Err(PipelineError::validation(format!(
                "text length {} outside allowed range {}..={}",
                len, limits.min_text_length, limits.max_text_length
            )));
        }
        let ratio = request.target_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(PipelineError::validation(format!(
                "target ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Run the pipeline without observing events
    pub async fn summarize(
        &self,
        request: SummaryRequest,
        cancel: &CancelFlag,
    ) -> Result<AggregateSummary> {
        self.run(request, cancel, |_| {}).await
    }

    /// Run the pipeline, reporting every event to `on_event`
    ///
    /// The terminal event mirrors the returned result.
    pub async fn run<F>(
        &self,
        request: SummaryRequest,
        cancel: &CancelFlag,
        on_event: F,
    ) -> Result<AggregateSummary>
    where
        F: Fn(ProcessingEvent) + Send + Sync,
    {
        let run_id = Uuid::new_v4();
        let strategy = request
            .strategy
            .unwrap_or_else(|| recommended_strategy(request.document.len()));

        tracing::info!(
            "[Pipeline] Run {} started: {} chars, strategy {}, persona {}",
            run_id,
            request.document.len(),
            strategy.as_str(),
            request.persona.as_str()
        );
        on_event(ProcessingEvent::Starting { strategy });

        match self.execute(&request, strategy, cancel, &on_event).await {
            Ok(summary) => {
                tracing::info!(
                    "[Pipeline] Run {} finished: {} sections, {} calls, {}",
                    run_id,
                    summary.section_count,
                    summary.total_external_calls,
                    summary.quality.describe()
                );
                on_event(ProcessingEvent::Success {
                    total_external_calls: summary.total_external_calls,
                    sections_processed: summary.section_count,
                    summary: Box::new(summary.clone()),
                });
                Ok(summary)
            }
            Err(e) => {
                match &e {
                    PipelineError::Cancelled => tracing::info!("[Pipeline] Run {} cancelled", run_id),
                    other => tracing::error!("[Pipeline] Run {} failed: {}", run_id, other),
                }
                on_event(ProcessingEvent::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run on a background task, streaming events through a channel
    ///
    /// The receiver closes after the terminal event.
    pub fn spawn(
        self: Arc<Self>,
        request: SummaryRequest,
        cancel: CancelFlag,
    ) -> (
        mpsc::UnboundedReceiver<ProcessingEvent>,
        JoinHandle<Result<AggregateSummary>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            self.run(request, &cancel, move |event| {
                // Receiver may be gone; the run still completes
                let _ = tx.send(event);
            })
            .await
        });
        (rx, handle)
    }

    async fn execute<F>(
        &self,
        request: &SummaryRequest,
        strategy: ProcessingStrategy,
        cancel: &CancelFlag,
        on_event: &F,
    ) -> Result<AggregateSummary>
    where
        F: Fn(ProcessingEvent) + Send + Sync,
    {
        self.validate(request)?;

        let text = request.document.text();
        let budget = request.section_budget.unwrap_or(SectionBudget::Strategy(strategy));
        let sections = self.sectioner.section(text, budget);
        if sections.is_empty() {
            return Err(PipelineError::validation("text produced no sections"));
        }
        let total = sections.len();
        on_event(ProcessingEvent::Progress {
            fraction: 0.0,
            message: format!("Split into {} section(s)", total),
        });

        let aggregator =
            HierarchicalAggregator::new(Arc::clone(&self.summarizer), self.config.aggregation.clone());
        let multiplier = aggregator.intermediate_multiplier(strategy, request.target_ratio);

        let processor =
            SectionProcessor::new(Arc::clone(&self.summarizer), self.config.processor.clone())
                .with_sleeper(Arc::clone(&self.sleeper));

        let summaries = processor
            .process(sections, request.persona, multiplier, cancel, |progress| {
                let message = if progress.failed_count > 0 {
                    format!(
                        "Summarized {}/{} sections ({} failed)",
                        progress.processed_count, progress.total, progress.failed_count
                    )
                } else {
                    format!("Summarized {}/{} sections", progress.processed_count, progress.total)
                };
                on_event(ProcessingEvent::Progress {
                    fraction: progress.fraction() * SECTION_PHASE_SHARE,
                    message,
                });
            })
            .await?;

        if total > 1 {
            on_event(ProcessingEvent::Progress {
                fraction: SECTION_PHASE_SHARE,
                message: "Combining section summaries".to_string(),
            });
        }

        aggregator
            .aggregate(
                summaries,
                request.document.len(),
                request.target_ratio,
                request.persona,
                strategy,
                cancel,
            )
            .await
    }
}
