//! Events emitted by the streaming form of the pipeline.

use crate::intent::Intent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named region of output, used to group streamed fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Explanation,
    Example,
    Question,
    Feedback,
}

impl Section {
    /// Display and speech order.
    pub const ORDER: [Section; 4] = [
        Section::Explanation,
        Section::Example,
        Section::Question,
        Section::Feedback,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Section::Explanation => "Explanation",
            Section::Example => "Example",
            Section::Question => "Question",
            Section::Feedback => "Feedback",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One item of the streamed response.
///
/// `Audio`, `Done` and `Error` are appended by the transport once the
/// pipeline itself has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Intent { intent: Intent },
    /// A new section starts; its content events follow.
    Section { section: Section },
    Content { section: Section, text: String },
    /// Replaces everything shown so far for `section`.
    Update { section: Section, text: String },
    Audio { url: String },
    Done,
    Error { message: String },
}
