//! Core records flowing through the extraction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fenced code block with its surrounding context window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// The enclosed code, without the fence markers
    pub code: String,

    /// Context window around the fences, inclusive of the snippet itself
    pub context: String,

    /// Line index of the opening fence
    pub start_line: usize,

    /// Line index of the closing fence, or the line count for an
    /// unterminated fence
    pub end_line: usize,

    /// Most recent heading seen before the opening fence
    pub section_title: Option<String>,
}

/// A validated question/answer pair.
///
/// Section-derived pairs carry neither `context` nor `code_snippet`;
/// snippet-derived pairs carry both. Serialized one-per-line in the
/// checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,

    pub question: String,

    pub answer: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

impl QaPair {
    /// Build a section-derived pair.
    pub fn for_section(title: impl Into<String>, question: String, answer: String) -> Self {
        Self {
            section_title: Some(title.into()),
            question,
            answer,
            context: None,
            code_snippet: None,
        }
    }

    /// Build a snippet-derived pair.
    pub fn for_snippet(
        section_title: Option<String>,
        context: String,
        code: String,
        question: String,
        answer: String,
    ) -> Self {
        Self {
            section_title,
            question,
            answer,
            context: Some(context),
            code_snippet: Some(code),
        }
    }
}

/// Source of a failed prompt, for replay bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Section,
    Snippet,
}

/// A question whose answer generation failed, recorded for one replay
/// attempt at the start of the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPrompt {
    /// Whether the prompt came from a section or a snippet
    #[serde(rename = "type")]
    pub kind: PromptKind,

    /// Section title or snippet code, depending on `kind`
    pub identifier: String,

    /// The validated question whose answer step failed
    pub question: String,
}

/// Statistics for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Sections submitted this run (after checkpoint filtering)
    pub sections: usize,
    /// Snippets submitted this run (after checkpoint filtering)
    pub snippets: usize,
    /// Sections/snippets skipped via the checkpoint store
    pub skipped: usize,
    /// Pairs recovered from the failure log
    pub replayed: usize,
    /// Total pairs emitted (replayed included)
    pub pairs_emitted: usize,
    /// Rounds that produced no pair
    pub rounds_failed: usize,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock runtime in seconds
    pub runtime_secs: f64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            sections: 0,
            snippets: 0,
            skipped: 0,
            replayed: 0,
            pairs_emitted: 0,
            rounds_failed: 0,
            started_at: Utc::now(),
            runtime_secs: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_pair_omits_snippet_fields() {
        let pair = QaPair::for_section("Intro", "Q?".into(), "A.".into());
        let json = serde_json::to_string(&pair).unwrap();
        assert!(!json.contains("context"));
        assert!(!json.contains("code_snippet"));
    }

    #[test]
    fn failed_prompt_wire_format() {
        let record = FailedPrompt {
            kind: PromptKind::Section,
            identifier: "Install".to_string(),
            question: "How do I install it?".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""type":"section""#));
        assert!(json.contains(r#""identifier":"Install""#));

        let back: FailedPrompt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn snippet_pair_round_trips() {
        let pair = QaPair::for_snippet(
            Some("Usage".into()),
            "ctx".into(),
            "fn main() {}".into(),
            "Q?".into(),
            "A.".into(),
        );
        let json = serde_json::to_string(&pair).unwrap();
        let back: QaPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }
}
