//! Segmenter: splits raw README-style text into titled sections and fenced
//! code snippets with surrounding context.
//!
//! Both walks are a single pass over the document's lines. Heading lines
//! start with `#`; fences are lines whose trimmed text starts with three
//! backticks.

use crate::models::{ExtractConfig, Snippet};
use indexmap::IndexMap;

const FENCE: &str = "```";

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
}

fn heading_title(line: &str) -> String {
    // Hashes strip from both ends, so closed ATX headings (`## Usage ##`)
    // normalize to the bare title.
    line.trim_matches('#').trim().to_string()
}

/// Split content into a title → body map, in document order.
///
/// Non-heading lines are trimmed and space-joined onto the current title's
/// body. Lines before the first heading are dropped. Duplicate titles
/// accumulate their bodies. Titles whose accumulated body trims to empty
/// are excluded from the result.
pub fn extract_sections(content: &str) -> IndexMap<String, String> {
    let mut sections: IndexMap<String, String> = IndexMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        if is_heading(line) {
            current = Some(heading_title(line));
        } else if let Some(title) = &current {
            let body = sections.entry(title.clone()).or_default();
            body.push_str(line.trim());
            body.push(' ');
        }
    }

    sections
        .into_iter()
        .filter_map(|(title, body)| {
            let body = body.trim().to_string();
            if body.is_empty() {
                None
            } else {
                Some((title, body))
            }
        })
        .collect()
}

/// Extract fenced code snippets with a bounded context window.
///
/// The context covers `[start - max_context_lines, end + context_window]`
/// clamped to document bounds, inclusive of the snippet itself. A fence with
/// no matching close runs to EOF rather than erroring; callers that care can
/// check `end_line == line count`.
pub fn extract_snippets(content: &str, extract: &ExtractConfig) -> Vec<Snippet> {
    let lines: Vec<&str> = content.lines().collect();
    let mut snippets = Vec::new();
    let mut current_section: Option<String> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if is_heading(line) {
            current_section = Some(heading_title(line));
            i += 1;
            continue;
        }

        if line.trim_start().starts_with(FENCE) {
            // First closing marker terminates the snippet; no nesting.
            let mut j = i + 1;
            while j < lines.len() && !lines[j].trim_start().starts_with(FENCE) {
                j += 1;
            }

            let code = lines[i + 1..j].join("\n");
            let context_start = i.saturating_sub(extract.max_context_lines);
            let context_end = (j + extract.context_window + 1).min(lines.len());
            let context = lines[context_start..context_end].join("\n");

            snippets.push(Snippet {
                code,
                context,
                start_line: i,
                end_line: j,
                section_title: current_section.clone(),
            });

            // Resume after the closing fence (or at EOF if unterminated).
            i = j + 1;
            continue;
        }

        i += 1;
    }

    snippets
}

/// Estimate how many questions a section body warrants from its word count.
pub fn estimate_question_count(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    if word_count < 50 {
        1
    } else if word_count < 150 {
        2
    } else {
        3
    }
}
