//! Smart sectioning
//!
//! Splits a document into ordered [`Section`]s:
//!
//! 1. Short text (within the size budget) becomes one section.
//! 2. Natural boundaries (markdown headers, "Chapter/Section/Part N",
//!    numbered headings, all-caps lines) are used when *every* resulting
//!    section fits the budget. Otherwise they are ignored entirely.
//! 3. Fallback: paragraphs are packed into sections, never split. Each new
//!    section starts with the tail of the previous one (at most
//!    [`SECTION_OVERLAP`] characters) so the summarizer keeps some context.
//!
//! Sizes and budgets count characters. Section offsets are byte offsets so
//! content can be sliced directly; they always fall on char boundaries.
//!
//! Coverage invariant: dropping `overlap` leading bytes from each section
//! and concatenating gives back the original text.

use super::types::{ProcessingStrategy, Section};
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters shared between adjacent fallback sections
pub const SECTION_OVERLAP: usize = 200;

/// A fallback section is only closed once it holds at least this many characters
pub const MIN_SECTION_SIZE: usize = 1_000;

/// Heading-like lines
static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)^[ \t]*(?:",
        r"#{1,6}[ \t]+\S[^\n]*",
        r"|(?:[Cc]hapter|CHAPTER|[Ss]ection|SECTION|[Pp]art|PART)[ \t]+(?:\d+|[IVXLCDM]+)\b[^\n]{0,80}",
        r"|\d{1,3}(?:\.\d{1,3})*\.?[ \t]+[A-Z][^\n]{0,78}[^.!?,;\s]",
        r"|[A-Z][A-Z0-9 ,:;'&\-]{3,79}",
        r")[ \t]*\r?$"
    ))
    .expect("heading pattern must compile")
});

/// Blank-line paragraph separator
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n[ \t\r]*\n\s*").expect("paragraph pattern must compile")
});

/// Section size for a document of `text_length` when no strategy fixes it
///
/// Fixed lookup; call-count estimates depend on these exact steps.
pub fn adaptive_section_size(text_length: usize) -> usize {
    match text_length {
        0..=50_000 => 8_000,
        50_001..=200_000 => 12_000,
        200_001..=500_000 => 20_000,
        _ => 30_000,
    }
}

/// How large sections may get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionBudget {
    Strategy(ProcessingStrategy),
    MaxSize(usize),
    Adaptive,
}

impl SectionBudget {
    pub fn max_size(&self, text_length: usize) -> usize {
        let size = match self {
            Self::Strategy(strategy) => strategy.section_size(text_length),
            Self::MaxSize(size) => *size,
            Self::Adaptive => adaptive_section_size(text_length),
        };
        size.max(1)
    }
}

impl From<ProcessingStrategy> for SectionBudget {
    fn from(strategy: ProcessingStrategy) -> Self {
        Self::Strategy(strategy)
    }
}

/// Splits text into sections; pure and reusable
#[derive(Debug, Clone)]
pub struct Sectioner {
    overlap: usize,
    min_section_size: usize,
}

impl Default for Sectioner {
    fn default() -> Self {
        Self {
            overlap: SECTION_OVERLAP,
            min_section_size: MIN_SECTION_SIZE,
        }
    }
}

/// Byte range plus title, before content is copied out
struct Span {
    start: usize,
    end: usize,
    overlap: usize,
    title: Option<String>,
}

impl Sectioner {
    pub fn new(overlap: usize, min_section_size: usize) -> Self {
        Self {
            overlap,
            min_section_size,
        }
    }

    /// Split `text` under `budget`. Blank text yields no sections.
    pub fn section(&self, text: &str, budget: impl Into<SectionBudget>) -> Vec<Section> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let total_chars = text.chars().count();
        let max_size = budget.into().max_size(total_chars);

        if total_chars <= max_size {
            return build_sections(
                text,
                vec![Span {
                    start: 0,
                    end: text.len(),
                    overlap: 0,
                    title: Some("Full Document".to_string()),
                }],
            );
        }

        if let Some(natural) = natural_spans(text) {
            if natural
                .iter()
                .all(|s| text[s.start..s.end].chars().count() <= max_size)
            {
                tracing::debug!(
                    "[Sectioner] Using {} natural sections (budget {})",
                    natural.len(),
                    max_size
                );
                return build_sections(text, natural);
            }
            tracing::debug!(
                "[Sectioner] Natural sections exceed budget {}, falling back to paragraphs",
                max_size
            );
        }

        build_sections(text, self.paragraph_spans(text, max_size))
    }

    /// Pack paragraphs into sections of at most `max_size` characters
    /// (a lone paragraph may exceed it)
    fn paragraph_spans(&self, text: &str, max_size: usize) -> Vec<Span> {
        let min_size = self.min_section_size.min(max_size / 2).max(1);
        let mut spans = Vec::new();

        let mut start = 0;
        let mut end = 0;
        let mut overlap = 0;
        let mut buffer_chars = 0;
        let mut last_paragraph_start = 0;

        for (para_start, para_end) in paragraphs(text) {
            let para_chars = text[para_start..para_end].chars().count();
            let has_own_text = end - start > overlap;

            if has_own_text && buffer_chars + para_chars > max_size && buffer_chars >= min_size {
                spans.push(Span {
                    start,
                    end,
                    overlap,
                    title: None,
                });

                let tail_start = tail_start(text, end, last_paragraph_start, self.overlap);
                overlap = end - tail_start;
                buffer_chars = text[tail_start..end].chars().count();
                start = tail_start;
            }

            end = para_end;
            buffer_chars += para_chars;
            last_paragraph_start = para_start;
        }

        if end > start {
            spans.push(Span {
                start,
                end,
                overlap,
                title: None,
            });
        }

        spans
    }
}

/// Byte ranges of paragraphs; each keeps its trailing blank-line separator
fn paragraphs(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        if m.end() > start {
            ranges.push((start, m.end()));
            start = m.end();
        }
    }
    if start < text.len() {
        ranges.push((start, text.len()));
    }
    ranges
}

/// Byte offset where the last `overlap` characters before `end` begin,
/// kept inside the last paragraph
fn tail_start(text: &str, end: usize, paragraph_start: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    text[paragraph_start..end]
        .char_indices()
        .rev()
        .take(overlap)
        .last()
        .map_or(end, |(offset, _)| paragraph_start + offset)
}

/// Sections from heading lines, or `None` when there are no headings
fn natural_spans(text: &str) -> Option<Vec<Span>> {
    let headings: Vec<(usize, String)> = HEADING
        .find_iter(text)
        .map(|m| (m.start(), clean_title(m.as_str())))
        .collect();

    let (first_start, _) = headings.first()?;
    let mut spans = Vec::with_capacity(headings.len() + 1);

    let preamble_has_text = !text[..*first_start].trim().is_empty();
    if preamble_has_text {
        spans.push(Span {
            start: 0,
            end: *first_start,
            overlap: 0,
            title: Some("Introduction".to_string()),
        });
    }

    for (i, (heading_start, title)) in headings.iter().enumerate() {
        let start = if i == 0 && !preamble_has_text {
            0
        } else {
            *heading_start
        };
        let end = headings
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(text.len());
        spans.push(Span {
            start,
            end,
            overlap: 0,
            title: Some(title.clone()),
        });
    }

    Some(spans)
}

fn clean_title(heading: &str) -> String {
    heading.trim().trim_start_matches('#').trim().to_string()
}

fn build_sections(text: &str, spans: Vec<Span>) -> Vec<Section> {
    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Section {
            index,
            title: span
                .title
                .unwrap_or_else(|| format!("Section {}", index + 1)),
            content: text[span.start..span.end].to_string(),
            start_index: span.start,
            end_index: span.end,
            overlap: span.overlap,
        })
        .collect()
}
