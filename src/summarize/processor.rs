//! Concurrent section processor
//!
//! Spawns one task per section and gates every summarizer call through a
//! [`CallGate`], so in-flight calls never exceed `concurrency_limit`.
//! Failed calls are retried with linear backoff; a section that runs out of
//! retries is marked FAILED and the rest carry on.
//!
//! Results come back to a single collector loop (this function) as tasks
//! finish. The collector owns the progress counters, so updates are
//! serialized and progress is reported in completion order.

use super::cancel::CancelFlag;
use super::gate::CallGate;
use super::retry::{tokio_sleeper, RetryPolicy, Sleeper};
use super::types::{ProcessingProgress, Section, SectionStatus, SectionSummary};
use crate::ai::{Persona, Summarizer, SummaryOutput};
use crate::config::{ProcessorConfig, Schedule};
use crate::error::{PipelineError, Result, SummarizerError};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;

/// Summarizes sections concurrently with bounded parallelism and retries
pub struct SectionProcessor {
    summarizer: Arc<dyn Summarizer>,
    config: ProcessorConfig,
    sleeper: Sleeper,
}

/// What a section task hands back to the collector
enum TaskOutcome {
    Finished(SectionSummary),
    Cancelled,
}

/// Why a single gated call produced no output
enum AttemptError {
    /// Gate closed; only happens on cancellation
    GateClosed,
    Failed(SummarizerError),
}

/// Everything a section task needs, shared across tasks
struct TaskContext {
    summarizer: Arc<dyn Summarizer>,
    gate: CallGate,
    policy: RetryPolicy,
    sleeper: Sleeper,
    persona: Persona,
    length_multiplier: f64,
    cancel: CancelFlag,
}

/// Aborts every spawned task still running when dropped
#[derive(Default)]
struct TaskSet {
    handles: Vec<AbortHandle>,
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Counters owned by the collector loop
struct ProgressTracker {
    total: usize,
    processed: usize,
    failed: usize,
}

impl ProgressTracker {
    fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
        }
    }

    fn record(&mut self, summary: &SectionSummary) -> ProcessingProgress {
        self.processed += 1;
        if summary.is_failed() {
            self.failed += 1;
        }
        ProcessingProgress {
            current: summary.section.index,
            total: self.total,
            processed_count: self.processed,
            failed_count: self.failed,
        }
    }
}

impl SectionProcessor {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: ProcessorConfig) -> Self {
        Self {
            summarizer,
            config,
            sleeper: tokio_sleeper(),
        }
    }

    /// Replace the backoff sleep (tests use an instant, recording sleeper)
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_base_delay)
            .with_fail_fast(self.config.fail_fast_on_client_errors)
    }

    /// Summarize every section; results are returned in section order
    ///
    /// `on_progress` is called once per section as it reaches a terminal
    /// state. Cancellation aborts all outstanding work and yields
    /// [`PipelineError::Cancelled`]; partial results are discarded.
    pub async fn process<F>(
        &self,
        sections: impl Into<Arc<[Section]>>,
        persona: Persona,
        length_multiplier: f64,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<Vec<SectionSummary>>
    where
        F: Fn(ProcessingProgress) + Send + Sync,
    {
        let sections: Arc<[Section]> = sections.into();
        let total = sections.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let batch_size = match self.config.schedule {
            Schedule::Bounded => total,
            Schedule::Batched { batch_size } => batch_size.max(1),
        };

        tracing::info!(
            "[Processor] Processing {} sections (limit {}, batch {}, retries {})",
            total,
            self.config.concurrency_limit,
            batch_size,
            self.config.max_retries
        );
        let started = Instant::now();

        let ctx = Arc::new(TaskContext {
            summarizer: Arc::clone(&self.summarizer),
            gate: CallGate::new(
                self.config.concurrency_limit,
                self.config.min_request_interval,
            ),
            policy: self.retry_policy(),
            sleeper: Arc::clone(&self.sleeper),
            persona,
            length_multiplier,
            cancel: cancel.clone(),
        });

        let mut results: Vec<Option<SectionSummary>> = vec![None; total];
        let mut tracker = ProgressTracker::new(total);
        let mut tasks = TaskSet::default();

        for batch_start in (0..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let mut pending = FuturesUnordered::new();

            for index in batch_start..batch_end {
                let ctx = Arc::clone(&ctx);
                let sections = Arc::clone(&sections);
                let handle = tokio::spawn(async move { ctx.run_section(&sections[index]).await });
                tasks.handles.push(handle.abort_handle());
                pending.push(async move { (index, handle.await) });
            }

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = pending.next() => Some(next),
                };

                let (index, joined) = match next {
                    None => {
                        ctx.gate.close();
                        tracing::info!(
                            "[Processor] Cancelled after {}/{} sections",
                            tracker.processed,
                            total
                        );
                        return Err(PipelineError::Cancelled);
                    }
                    Some(None) => break,
                    Some(Some(item)) => item,
                };

                let summary = match joined {
                    Ok(TaskOutcome::Finished(summary)) => summary,
                    Ok(TaskOutcome::Cancelled) => {
                        ctx.gate.close();
                        return Err(PipelineError::Cancelled);
                    }
                    Err(e) => {
                        tracing::error!("[Processor] Section {} task failed: {}", index, e);
                        failed_summary(&sections[index], 0, format!("section task failed: {}", e))
                    }
                };

                let progress = tracker.record(&summary);
                tracing::debug!(
                    "[Processor] Section {} {:?} ({}/{} done, {} failed)",
                    index,
                    summary.status,
                    progress.processed_count,
                    total,
                    progress.failed_count
                );
                results[index] = Some(summary);
                on_progress(progress);
            }
        }

        tracing::info!(
            "[Processor] Completed: {} summarized, {} failed, {}ms",
            tracker.processed - tracker.failed,
            tracker.failed,
            started.elapsed().as_millis()
        );

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PipelineError::internal("section result missing"))
    }
}

impl TaskContext {
    /// Summarize one section with retries; owns its `SectionSummary` until terminal
    async fn run_section(&self, section: &Section) -> TaskOutcome {
        let mut summary = SectionSummary::pending(section.clone());
        summary.status = SectionStatus::Processing;
        let mut retries = 0;

        loop {
            if self.cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TaskOutcome::Cancelled,
                attempt = self.attempt(section) => attempt,
            };

            let error = match attempt {
                Ok(output) => {
                    summary.summary = output.summary;
                    summary.bullet_points = output.bullet_points;
                    summary.status = SectionStatus::Completed;
                    summary.retry_count = retries;
                    return TaskOutcome::Finished(summary);
                }
                Err(AttemptError::GateClosed) => return TaskOutcome::Cancelled,
                Err(AttemptError::Failed(error)) => error,
            };

            if !self.policy.should_retry(&error, retries) {
                tracing::warn!(
                    "[Processor] Section {} failed after {} retries: {}",
                    section.index,
                    retries,
                    error
                );
                return TaskOutcome::Finished(failed_summary(section, retries, error.to_string()));
            }

            retries += 1;
            let delay = self.policy.delay_for(retries);
            tracing::warn!(
                "[Processor] Section {} attempt failed ({}), retry {}/{} in {:?}",
                section.index,
                error,
                retries,
                self.policy.max_retries,
                delay
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TaskOutcome::Cancelled,
                _ = (self.sleeper)(delay) => {}
            }
        }
    }

    /// One gated call; the permit is released before any backoff
    async fn attempt(&self, section: &Section) -> std::result::Result<SummaryOutput, AttemptError> {
        let _permit = self.gate.acquire().await.ok_or(AttemptError::GateClosed)?;
        let output = self
            .summarizer
            .summarize(&section.content, self.persona, self.length_multiplier)
            .await
            .map_err(AttemptError::Failed)?;

        if output.summary.trim().is_empty() {
            return Err(AttemptError::Failed(SummarizerError::InvalidResponse(
                "empty summary".to_string(),
            )));
        }
        Ok(output)
    }
}

fn failed_summary(section: &Section, retries: u32, error: String) -> SectionSummary {
    SectionSummary {
        status: SectionStatus::Failed,
        retry_count: retries,
        error: Some(error),
        ..SectionSummary::pending(section.clone())
    }
}
