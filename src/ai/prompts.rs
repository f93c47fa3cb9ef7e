use serde::{Deserialize, Serialize};

/// System prompt shared by every persona
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are a document summarization assistant. You condense text faithfully.

RULES:
1. Only state facts that appear in the text. Never invent names, numbers, or conclusions.
2. Preserve proper nouns, dates, amounts, and figures verbatim.
3. Write the summary as flowing prose, then list the key points separately.
4. Respect the requested length. Shorter is better than longer.

Respond ONLY with this JSON object:
{
  "summary": "the condensed text",
  "bullet_points": ["key point one", "key point two"]
}"#;

/// Audience the summary is written for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    General,
    Executive,
    Student,
    Researcher,
    Casual,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Self::General,
        Self::Executive,
        Self::Student,
        Self::Researcher,
        Self::Casual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Executive => "executive",
            Self::Student => "student",
            Self::Researcher => "researcher",
            Self::Casual => "casual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::General => "General Reader",
            Self::Executive => "Executive Brief",
            Self::Student => "Study Notes",
            Self::Researcher => "Research Digest",
            Self::Casual => "Quick Read",
        }
    }

    /// Style instruction appended to the user prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::General => "Write for a general audience in clear, neutral language.",
            Self::Executive => {
                "Lead with decisions, outcomes, risks, and numbers. Skip background a busy executive already knows."
            }
            Self::Student => {
                "Explain the core concepts and definitions in the order a learner needs them. Keep terminology precise."
            }
            Self::Researcher => {
                "Keep methods, evidence, limitations, and exact figures. Distinguish findings from claims."
            }
            Self::Casual => "Use a relaxed, conversational tone and plain words.",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" | "default" => Some(Self::General),
            "executive" | "exec" | "business" => Some(Self::Executive),
            "student" | "study" => Some(Self::Student),
            "researcher" | "research" | "academic" => Some(Self::Researcher),
            "casual" | "quick" => Some(Self::Casual),
            _ => None,
        }
    }
}

/// Rough words-per-character ratio used to turn a length budget into a word count
const CHARS_PER_WORD: f64 = 6.0;

/// Smallest word budget ever requested
const MIN_TARGET_WORDS: usize = 30;

/// Word budget for summarizing `text_len` characters at `length_multiplier`
pub fn target_words(text_len: usize, length_multiplier: f64) -> usize {
    let target_chars = text_len as f64 * length_multiplier.clamp(0.0, 1.0);
    ((target_chars / CHARS_PER_WORD).round() as usize).max(MIN_TARGET_WORDS)
}

/// Build user prompt for one summarization call
pub fn build_summary_prompt(text: &str, persona: Persona, length_multiplier: f64) -> String {
    format!(
        r#"Summarize the text below.

AUDIENCE: {}
STYLE: {}
LENGTH: about {} words ({:.0}% of the original)

TEXT:
---
{}
---"#,
        persona.display_name(),
        persona.instruction(),
        target_words(text.chars().count(), length_multiplier),
        length_multiplier.clamp(0.0, 1.0) * 100.0,
        text
    )
}
