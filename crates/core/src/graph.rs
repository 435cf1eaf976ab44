//! The fixed workflow graph.
//!
//! ```text
//! infer_intent ─┬─ answer ──▶ evaluate ─────────────────────────────┐
//!               └─ other ───▶ simplify ▶ example ▶ safety ▶ question ┴▶ format
//! ```
//!
//! The only conditional edge leaves `infer_intent`. Every path ends at `format`.

use crate::{error::PipelineError, intent::Intent, state::PipelineState};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    InferIntent,
    Simplify,
    Example,
    Safety,
    Question,
    Evaluate,
    Format,
}

impl StageName {
    pub const ENTRY: StageName = StageName::InferIntent;

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::InferIntent => "infer_intent",
            StageName::Simplify => "simplify",
            StageName::Example => "example",
            StageName::Safety => "safety",
            StageName::Question => "question",
            StageName::Evaluate => "evaluate",
            StageName::Format => "format",
        }
    }

    /// Stages belonging to the explanation sub-pipeline.
    pub fn is_explanation_stage(self) -> bool {
        matches!(
            self,
            StageName::Simplify | StageName::Example | StageName::Safety | StageName::Question
        )
    }

    /// The stage that runs after `self`, or `None` once `format` has run.
    pub fn next(self, state: &PipelineState) -> Result<Option<StageName>, PipelineError> {
        let next = match self {
            StageName::InferIntent => Some(route_by_intent(state.intent()?)),
            StageName::Simplify => Some(StageName::Example),
            StageName::Example => Some(StageName::Safety),
            StageName::Safety => Some(StageName::Question),
            StageName::Question | StageName::Evaluate => Some(StageName::Format),
            StageName::Format => None,
        };
        Ok(next)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The branch point: answers are evaluated, everything else is explained.
pub fn route_by_intent(intent: Intent) -> StageName {
    match intent {
        Intent::Answer => StageName::Evaluate,
        Intent::NewQuestion | Intent::Followup => StageName::Simplify,
    }
}
