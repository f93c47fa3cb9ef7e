//! Shared types for the summarization pipeline

use super::sectioner::SectionBudget;
use crate::ai::Persona;
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Section size used by the DUAL strategy
pub const DUAL_SECTION_SIZE: usize = 50_000;

/// Section size used by the MULTI strategy
pub const MULTI_SECTION_SIZE: usize = 10_000;

/// Immutable input text for one pipeline run
///
/// Length is measured in characters; thresholds and budgets all use it.
#[derive(Debug, Clone)]
pub struct Document {
    text: Arc<str>,
    chars: usize,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text: Arc<str> = Arc::from(text.into());
        let chars = text.chars().count();
        Self { text, chars }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when there is nothing to summarize
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Processing policy fixing section size and intermediate compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStrategy {
    /// One call over the whole text
    Single,
    /// 50k-character sections plus an aggregation call
    Dual,
    /// 10k-character sections plus an aggregation call
    Multi,
}

impl ProcessingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Dual => "dual",
            Self::Multi => "multi",
        }
    }

    /// Target section size for a document of `text_length`
    pub fn section_size(&self, text_length: usize) -> usize {
        match self {
            Self::Single => text_length.max(1),
            Self::Dual => DUAL_SECTION_SIZE,
            Self::Multi => MULTI_SECTION_SIZE,
        }
    }
}

/// One strategy offered to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOption {
    pub strategy: ProcessingStrategy,
    pub title: String,
    pub description: String,
    pub estimated_calls: usize,
    pub benefits: Vec<String>,
    pub drawbacks: Vec<String>,
    pub is_recommended: bool,
}

/// Contiguous slice of the document processed as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Position in document order, starting at 0
    pub index: usize,
    pub title: String,
    /// `document[start_index..end_index]`
    pub content: String,
    /// Byte offset into the document
    pub start_index: usize,
    /// Byte offset into the document (exclusive)
    pub end_index: usize,
    /// Leading bytes shared with the previous section
    pub overlap: usize,
}

impl Section {
    /// Number of characters in `content`
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Overlap measured in characters
    pub fn overlap_chars(&self) -> usize {
        self.content[..self.overlap].chars().count()
    }

    /// Content with the shared leading overlap removed
    pub fn unique_content(&self) -> &str {
        &self.content[self.overlap..]
    }
}

/// Lifecycle of one section's summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SectionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Summary state for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub section: Section,
    pub summary: String,
    pub bullet_points: Vec<String>,
    pub status: SectionStatus,
    /// Retries performed beyond the first attempt
    pub retry_count: u32,
    pub error: Option<String>,
}

impl SectionSummary {
    pub fn pending(section: Section) -> Self {
        Self {
            section,
            summary: String::new(),
            bullet_points: Vec::new(),
            status: SectionStatus::Pending,
            retry_count: 0,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SectionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == SectionStatus::Failed
    }
}

/// Snapshot emitted whenever a section reaches a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingProgress {
    /// Index of the section that just finished
    pub current: usize,
    pub total: usize,
    /// Successes plus failures so far
    pub processed_count: usize,
    pub failed_count: usize,
}

impl ProcessingProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed_count as f64 / self.total as f64
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.processed_count - self.failed_count
    }
}

/// How much of the document made it into the final summary via section summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResultQuality {
    /// Every section summarized
    Complete,
    /// Some sections fell back to raw text
    Degraded { failed_sections: usize },
    /// No section summary succeeded; aggregation ran on raw text only
    AllSectionsFailed,
}

impl ResultQuality {
    pub fn from_counts(section_count: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Complete
        } else if failed >= section_count {
            Self::AllSectionsFailed
        } else {
            Self::Degraded {
                failed_sections: failed,
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Complete => "complete".to_string(),
            Self::Degraded { failed_sections } => format!(
                "degraded: {} section(s) used raw text",
                failed_sections
            ),
            Self::AllSectionsFailed => {
                "degraded: every section failed, summary built from raw text".to_string()
            }
        }
    }
}

/// Final result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub overall_summary: String,
    pub section_summaries: Vec<SectionSummary>,
    pub total_characters: usize,
    pub section_count: usize,
    pub total_external_calls: usize,
    pub strategy: ProcessingStrategy,
    pub quality: ResultQuality,
    pub created_at: DateTime<Utc>,
}

impl AggregateSummary {
    pub fn is_degraded(&self) -> bool {
        self.quality.is_degraded()
    }

    pub fn failed_sections(&self) -> impl Iterator<Item = &SectionSummary> {
        self.section_summaries.iter().filter(|s| s.is_failed())
    }
}

/// What the caller asks the pipeline to do
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub document: Document,
    /// `None` picks the recommended strategy for the document length
    pub strategy: Option<ProcessingStrategy>,
    pub persona: Persona,
    /// Final summary length as a fraction of the original (0.0, 1.0]
    pub target_ratio: f64,
    /// Overrides the strategy's section size, e.g. [`SectionBudget::Adaptive`]
    pub section_budget: Option<SectionBudget>,
}

impl SummaryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            document: Document::new(text),
            strategy: None,
            persona: Persona::default(),
            target_ratio: 0.1,
            section_budget: None,
        }
    }

    pub fn with_strategy(mut self, strategy: ProcessingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio;
        self
    }

    pub fn with_section_budget(mut self, budget: SectionBudget) -> Self {
        self.section_budget = Some(budget);
        self
    }
}

/// Event stream exposed to the caller
///
/// Order: one `Starting`, any number of `Progress` with non-decreasing
/// `fraction`, then exactly one `Success` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ProcessingEvent {
    Starting {
        strategy: ProcessingStrategy,
    },
    Progress {
        fraction: f64,
        message: String,
    },
    Success {
        summary: Box<AggregateSummary>,
        total_external_calls: usize,
        sections_processed: usize,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ProcessingEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}
