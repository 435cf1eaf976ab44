//! Text segmentation for model output.
//!
//! Models do not always honour the "no meta-commentary" instruction, so the
//! text shown to the learner goes through this module. Invariants:
//!
//! - A pattern miss is never an error: when the content-start marker is
//!   absent the whole text is kept.
//! - Cleaning only removes text; it never reorders or rewrites words.
//! - Runs of blank lines collapse to a single blank line and the result is
//!   trimmed.
//! - Section splitting recognizes `Example:` and `Question:` labels in any
//!   letter case. Text before the first label belongs to `Explanation`.

use crate::{events::PipelineEvent, events::Section, format::ExplainOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CONTENT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Let['’]s talk about").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SECTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(example|question):").expect("valid regex"));

const EXAMPLE_LABEL: &str = "Example:";

/// Returns the text from the content-start marker onwards, or all of it.
pub fn extract_content(text: &str) -> &str {
    match CONTENT_START.find(text) {
        Some(m) => &text[m.start()..],
        None => text,
    }
}

/// Collapses redundant blank lines and trims the ends.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n\n").trim().to_string()
}

/// Cleans the safety stage's rewrite before it replaces streamed text.
pub fn clean_safety_output(text: &str) -> String {
    collapse_blank_lines(extract_content(text))
}

/// Drops every `Example:` block except the last one.
///
/// Removes text from the first `Example:` label (which must be followed by
/// whitespace) up to and including the last newline before the final
/// `Example:` label. Text with fewer than two labels is returned unchanged.
pub fn drop_repeated_examples(text: &str) -> String {
    let Some(first) = text
        .match_indices(EXAMPLE_LABEL)
        .map(|(idx, _)| idx)
        .find(|&idx| {
            text[idx + EXAMPLE_LABEL.len()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
        })
    else {
        return text.to_string();
    };
    let Some(last) = text.rfind(EXAMPLE_LABEL) else {
        return text.to_string();
    };
    if last <= first {
        return text.to_string();
    }
    let body_start = first + EXAMPLE_LABEL.len() + 1;
    match text[..last].rfind('\n') {
        Some(newline) if newline >= body_start => {
            format!("{}{}", &text[..first], &text[newline + 1..])
        }
        _ => text.to_string(),
    }
}

/// Sections shown to the learner, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySections {
    #[serde(rename = "Explanation", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(rename = "Example", default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(rename = "Question", default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(rename = "Feedback", default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl DisplaySections {
    fn slot_mut(&mut self, section: Section) -> &mut Option<String> {
        match section {
            Section::Explanation => &mut self.explanation,
            Section::Example => &mut self.example,
            Section::Question => &mut self.question,
            Section::Feedback => &mut self.feedback,
        }
    }

    pub fn get(&self, section: Section) -> Option<&str> {
        match section {
            Section::Explanation => self.explanation.as_deref(),
            Section::Example => self.example.as_deref(),
            Section::Question => self.question.as_deref(),
            Section::Feedback => self.feedback.as_deref(),
        }
    }

    pub fn set(&mut self, section: Section, text: impl Into<String>) {
        *self.slot_mut(section) = Some(text.into());
    }

    pub fn append(&mut self, section: Section, fragment: &str) {
        self.slot_mut(section)
            .get_or_insert_with(String::new)
            .push_str(fragment);
    }

    /// Folds a streamed event into the accumulated sections.
    pub fn apply_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Content { section, text } => self.append(*section, text),
            PipelineEvent::Update { section, text } => self.set(*section, text.clone()),
            _ => {}
        }
    }

    /// `"Label: content"` per non-empty section, separated by blank lines.
    pub fn speech_text(&self) -> String {
        Section::ORDER
            .iter()
            .filter_map(|&section| {
                self.get(section)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(|text| format!("{}: {}", section.label(), text))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        Section::ORDER
            .iter()
            .all(|&s| self.get(s).is_none_or(|t| t.trim().is_empty()))
    }
}

/// Cleans `raw` and splits it on `Example:` / `Question:` labels.
///
/// Pieces belonging to the same section are joined with a single space.
/// Sections with no text are left unset.
pub fn split_sections(raw: &str) -> DisplaySections {
    let content = collapse_blank_lines(&drop_repeated_examples(extract_content(raw)));

    let mut sections = DisplaySections::default();
    let mut current = Section::Explanation;
    let mut pieces: Vec<&str> = Vec::new();
    let mut flush = |section: Section, pieces: &mut Vec<&str>| {
        if !pieces.is_empty() {
            sections.set(section, pieces.join(" "));
            pieces.clear();
        }
    };

    let mut cursor = 0;
    for label in SECTION_LABEL.find_iter(&content) {
        let piece = content[cursor..label.start()].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        flush(current, &mut pieces);
        current = if label.as_str().to_lowercase().starts_with("example") {
            Section::Example
        } else {
            Section::Question
        };
        cursor = label.end();
    }
    let tail = content[cursor..].trim();
    if !tail.is_empty() {
        pieces.push(tail);
    }
    flush(current, &mut pieces);

    sections
}

/// Builds the display sections for a blocking pipeline result.
///
/// The explanation comes from segmenting the safety-refined text; its
/// `Example:` block wins over the example stage output when present. The
/// question always comes from the question stage.
pub fn display_sections(output: &ExplainOutput) -> DisplaySections {
    match output {
        ExplainOutput::Feedback { feedback, .. } => DisplaySections {
            feedback: Some(feedback.clone()),
            ..Default::default()
        },
        ExplainOutput::Explanation {
            explanation,
            example,
            question,
            ..
        } => {
            let segmented = split_sections(explanation);
            let example = segmented
                .example
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| example.clone());
            DisplaySections {
                explanation: Some(segmented.explanation.unwrap_or_default()),
                example: Some(example),
                question: Some(question.clone()),
                feedback: None,
            }
        }
    }
}
