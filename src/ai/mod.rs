//! Summarizer seam
//!
//! The pipeline only ever talks to an [`Summarizer`]: "summarize this text
//! for this persona, at roughly this fraction of its length". The
//! [`OpenAiSummarizer`] adapter implements it against an OpenAI-compatible
//! chat-completions endpoint; tests use in-memory fakes.

pub mod openai;
pub mod prompts;
mod utils;

use crate::error::SummarizerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::{OpenAiConfig, OpenAiSummarizer};
pub use prompts::Persona;

/// Output of one summarizer call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput {
    /// Condensed prose
    pub summary: String,
    /// Key points, may be empty
    #[serde(default, alias = "bullet_points")]
    pub bullet_points: Vec<String>,
}

/// External summarization service.
///
/// `length_multiplier` is the desired output length as a fraction of the
/// input length (0.0-1.0). Implementations may be slow and may fail; the
/// pipeline handles retries and timeouts are the implementation's concern.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        persona: Persona,
        length_multiplier: f64,
    ) -> Result<SummaryOutput, SummarizerError>;
}
