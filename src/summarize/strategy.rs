//! Strategy selection
//!
//! Pure arithmetic over the document length: which strategies are viable,
//! how many external calls each costs, and which one to recommend.

use super::types::{ProcessingOption, ProcessingStrategy};

/// DUAL is offered above this length
pub const DUAL_MIN_LENGTH: usize = 20_000;

/// MULTI is offered above this length
pub const MULTI_MIN_LENGTH: usize = 10_000;

/// SINGLE is recommended below this length
pub const SINGLE_RECOMMENDED_BELOW: usize = 30_000;

/// DUAL is recommended up to and including this length; MULTI above it
pub const DUAL_RECOMMENDED_MAX: usize = 100_000;

/// Strategy recommended for a document of `text_length`
pub fn recommended_strategy(text_length: usize) -> ProcessingStrategy {
    if text_length < SINGLE_RECOMMENDED_BELOW {
        ProcessingStrategy::Single
    } else if text_length <= DUAL_RECOMMENDED_MAX {
        ProcessingStrategy::Dual
    } else {
        ProcessingStrategy::Multi
    }
}

/// Number of sections `strategy` produces by size alone
pub fn estimated_sections(strategy: ProcessingStrategy, text_length: usize) -> usize {
    let size = strategy.section_size(text_length);
    text_length.div_ceil(size).max(1)
}

/// External calls for `strategy`: one per section plus one aggregation call
/// when there is more than one section
pub fn estimated_calls(strategy: ProcessingStrategy, text_length: usize) -> usize {
    let sections = estimated_sections(strategy, text_length);
    if sections > 1 {
        sections + 1
    } else {
        1
    }
}

/// Viable strategies for a document of `text_length`, in SINGLE, DUAL, MULTI order
pub fn select_options(text_length: usize) -> Vec<ProcessingOption> {
    let recommended = recommended_strategy(text_length);
    let mut options = vec![build_option(ProcessingStrategy::Single, text_length, recommended)];

    if text_length > DUAL_MIN_LENGTH {
        options.push(build_option(ProcessingStrategy::Dual, text_length, recommended));
    }
    if text_length > MULTI_MIN_LENGTH {
        options.push(build_option(ProcessingStrategy::Multi, text_length, recommended));
    }

    options
}

fn build_option(
    strategy: ProcessingStrategy,
    text_length: usize,
    recommended: ProcessingStrategy,
) -> ProcessingOption {
    let calls = estimated_calls(strategy, text_length);
    let sections = estimated_sections(strategy, text_length);

    let (title, description, benefits, drawbacks) = match strategy {
        ProcessingStrategy::Single => (
            "Quick Summary",
            "Summarize the whole document in one pass.".to_string(),
            vec!["Fastest result", "Single request"],
            vec!["Long documents may lose detail"],
        ),
        ProcessingStrategy::Dual => (
            "Balanced Summary",
            format!(
                "Split into {} large section(s), summarize each, then merge.",
                sections
            ),
            vec!["Keeps more detail than a single pass", "Few requests"],
            vec!["Slower than a single pass"],
        ),
        ProcessingStrategy::Multi => (
            "Detailed Summary",
            format!(
                "Split into {} section(s), summarize them in parallel, then synthesize.",
                sections
            ),
            vec!["Best coverage of long documents", "Section-by-section breakdown"],
            vec!["Most requests", "Takes longest"],
        ),
    };

    ProcessingOption {
        strategy,
        title: title.to_string(),
        description,
        estimated_calls: calls,
        benefits: benefits.into_iter().map(String::from).collect(),
        drawbacks: drawbacks.into_iter().map(String::from).collect(),
        is_recommended: strategy == recommended,
    }
}
