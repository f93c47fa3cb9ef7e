//! Adaptive summarization for documents of any length.
//!
//! Text is split into sections sized for the chosen strategy, sections are
//! summarized concurrently against an external [`Summarizer`], and the
//! results are folded into one final summary.
//!
//! ```no_run
//! use std::sync::Arc;
//! use longdoc::{CancelFlag, DocumentSummarizer, OpenAiConfig, OpenAiSummarizer, PipelineConfig, SummaryRequest};
//!
//! # async fn demo(text: String) -> Result<(), Box<dyn std::error::Error>> {
//! longdoc::init_tracing();
//! let summarizer = Arc::new(OpenAiSummarizer::new(OpenAiConfig::from_env()?)?);
//! let pipeline = DocumentSummarizer::new(summarizer, PipelineConfig::from_env()?);
//! let result = pipeline
//!     .run(SummaryRequest::new(text), &CancelFlag::new(), |event| println!("{:?}", event))
//!     .await?;
//! println!("{}", result.overall_summary);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod config;
pub mod error;
pub mod summarize;

pub use ai::{OpenAiConfig, OpenAiSummarizer, Persona, Summarizer, SummaryOutput};
pub use config::{AggregationConfig, PipelineConfig, ProcessorConfig, Schedule, ValidationConfig};
pub use error::{ConfigError, ErrorKind, PipelineError, Result, SummarizerError};
pub use summarize::{
    AggregateSummary, CancelFlag, DocumentSummarizer, HierarchicalAggregator, ProcessingEvent,
    ProcessingOption, ProcessingProgress, ProcessingStrategy, ResultQuality, Section,
    SectionProcessor, SectionStatus, SectionSummary, Sectioner, SummaryRequest,
};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`
///
/// Default: warn for dependencies, info for this crate. Use
/// `RUST_LOG=longdoc=debug` for per-section logs. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,longdoc=info")),
        )
        .try_init();
}
