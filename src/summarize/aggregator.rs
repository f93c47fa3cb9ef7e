//! Hierarchical aggregation of section summaries
//!
//! Section summaries are folded into one synthesis document which gets a
//! final summarizer pass. The final length multiplier is recomputed against
//! the synthesis length so the result lands near the caller's target ratio
//! of the *original* document.

use super::cancel::CancelFlag;
use super::types::{AggregateSummary, ProcessingStrategy, ResultQuality, SectionSummary};
use crate::ai::{Persona, Summarizer};
use crate::config::AggregationConfig;
use crate::error::{PipelineError, Result, SummarizerError};
use chrono::Utc;
use std::sync::Arc;

pub struct HierarchicalAggregator {
    summarizer: Arc<dyn Summarizer>,
    config: AggregationConfig,
}

impl HierarchicalAggregator {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: AggregationConfig) -> Self {
        Self { summarizer, config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Multiplier for section-level calls
    pub fn intermediate_multiplier(&self, strategy: ProcessingStrategy, target_ratio: f64) -> f64 {
        self.config.intermediate_multiplier(strategy, target_ratio)
    }

    /// Multiplier for the final pass: `original_len * target_ratio / synthesis_len`, clamped
    pub fn final_multiplier(&self, original_len: usize, target_ratio: f64, synthesis_len: usize) -> f64 {
        if synthesis_len == 0 {
            return 1.0;
        }
        let final_target = original_len as f64 * target_ratio;
        (final_target / synthesis_len as f64).clamp(self.config.min_final_multiplier, 1.0)
    }

    /// Fold section results into one document
    ///
    /// Sections appear in index order. Completed sections contribute their
    /// summary and bullet points; failed sections contribute raw text. DUAL
    /// headers also note each section's share of the original.
    pub fn build_synthesis(
        summaries: &[SectionSummary],
        original_len: usize,
        strategy: ProcessingStrategy,
    ) -> String {
        let mut doc = String::new();

        for item in summaries {
            let section = &item.section;
            doc.push_str(&format!("## {}", section.title));
            if strategy == ProcessingStrategy::Dual && original_len > 0 {
                let share = section.len() as f64 / original_len as f64 * 100.0;
                doc.push_str(&format!(" (~{:.0}% of document)", share));
            }
            doc.push('\n');

            if item.is_completed() {
                doc.push_str(item.summary.trim());
                doc.push('\n');
                for point in &item.bullet_points {
                    doc.push_str(&format!("- {}\n", point.trim()));
                }
            } else {
                // No summary to use; pass the text itself through
                doc.push_str(section.unique_content().trim());
                doc.push('\n');
            }
            doc.push('\n');
        }

        doc
    }

    /// Produce the final summary from per-section results
    ///
    /// A single section never costs another call: its summary is the final
    /// summary, or its raw text when it failed. Everything else costs exactly
    /// one more summarizer call; if that call fails the whole run fails with
    /// [`PipelineError::Aggregation`].
    pub async fn aggregate(
        &self,
        section_summaries: Vec<SectionSummary>,
        original_len: usize,
        target_ratio: f64,
        persona: Persona,
        strategy: ProcessingStrategy,
        cancel: &CancelFlag,
    ) -> Result<AggregateSummary> {
        if section_summaries.is_empty() {
            return Err(PipelineError::internal("no sections to aggregate"));
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let section_count = section_summaries.len();
        let failed = section_summaries.iter().filter(|s| s.is_failed()).count();
        let quality = ResultQuality::from_counts(section_count, failed);

        if section_count == 1 {
            let only = &section_summaries[0];
            let overall_summary = if only.is_completed() {
                tracing::info!("[Aggregator] Single section, using its summary directly");
                only.summary.clone()
            } else {
                tracing::warn!("[Aggregator] Single section failed, returning its raw text");
                only.section.unique_content().trim().to_string()
            };
            return Ok(AggregateSummary {
                overall_summary,
                section_summaries,
                total_characters: original_len,
                section_count,
                total_external_calls: 1,
                strategy,
                quality,
                created_at: Utc::now(),
            });
        }

        let synthesis = Self::build_synthesis(&section_summaries, original_len, strategy);
        let synthesis_len = synthesis.chars().count();
        let multiplier = self.final_multiplier(original_len, target_ratio, synthesis_len);

        if quality.is_degraded() {
            tracing::warn!("[Aggregator] Aggregating with {}", quality.describe());
        }
        tracing::info!(
            "[Aggregator] Final pass over {} sections ({} chars synthesis, multiplier {:.3})",
            section_count,
            synthesis_len,
            multiplier
        );

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            output = self.summarizer.summarize(&synthesis, persona, multiplier) => output,
        };

        let output = output.map_err(|source| {
            tracing::error!("[Aggregator] Final summarization failed: {}", source);
            PipelineError::Aggregation { source }
        })?;

        if output.summary.trim().is_empty() {
            return Err(PipelineError::Aggregation {
                source: SummarizerError::InvalidResponse("empty final summary".to_string()),
            });
        }

        Ok(AggregateSummary {
            overall_summary: output.summary.trim().to_string(),
            section_summaries,
            total_characters: original_len,
            section_count,
            total_external_calls: section_count + 1,
            strategy,
            quality,
            created_at: Utc::now(),
        })
    }
}
