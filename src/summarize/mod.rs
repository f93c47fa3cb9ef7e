//! Adaptive long-document summarization
//!
//! Architecture:
//! ```text
//! SummaryRequest
//!     │
//!     ├─► strategy    pick SINGLE / DUAL / MULTI from the text length
//!     ├─► sectioner   natural headings, else paragraph chunks with overlap
//!     ├─► processor   concurrent section calls (gate + retries + cancel)
//!     └─► aggregator  synthesis document + one final call
//!             │
//!             ▼
//!      ProcessingEvent::Success / Error
//! ```
//!
//! [`DocumentSummarizer`] wires the stages together. Each stage is usable on
//! its own; only the processor and aggregator perform I/O, and only through
//! the [`Summarizer`](crate::ai::Summarizer) trait.

pub mod aggregator;
pub mod cancel;
pub mod gate;
pub mod pipeline;
pub mod processor;
pub mod retry;
pub mod sectioner;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;

pub use aggregator::HierarchicalAggregator;
pub use cancel::CancelFlag;
pub use pipeline::DocumentSummarizer;
pub use processor::SectionProcessor;
pub use retry::{RetryPolicy, Sleeper};
pub use sectioner::{SectionBudget, Sectioner};
pub use strategy::{estimated_calls, recommended_strategy, select_options};
pub use types::{
    AggregateSummary, Document, ProcessingEvent, ProcessingOption, ProcessingProgress,
    ProcessingStrategy, ResultQuality, Section, SectionStatus, SectionSummary, SummaryRequest,
};
