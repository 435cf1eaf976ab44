//! The terminal `format` stage and the response contract it produces.

use crate::{error::PipelineError, intent::Intent, state::PipelineState};
use serde::{Deserialize, Serialize};

/// Final pipeline output, discriminated by `intent`.
///
/// Serializes flat: `{intent, feedback}` for answers, otherwise
/// `{intent, topic, age, explanation, example, question}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplainOutput {
    Feedback {
        intent: Intent,
        feedback: String,
    },
    Explanation {
        intent: Intent,
        topic: String,
        age: u32,
        explanation: String,
        example: String,
        question: String,
    },
}

impl ExplainOutput {
    pub fn intent(&self) -> Intent {
        match self {
            ExplainOutput::Feedback { intent, .. } | ExplainOutput::Explanation { intent, .. } => {
                *intent
            }
        }
    }
}

/// Shapes the accumulated state into the response contract.
///
/// `explanation` is the safety-refined text, not the first simplification.
pub fn format_output(state: &PipelineState) -> Result<ExplainOutput, PipelineError> {
    let intent = state.intent()?;
    let output = match intent {
        Intent::Answer => ExplainOutput::Feedback {
            intent,
            feedback: state.feedback()?.to_string(),
        },
        Intent::NewQuestion | Intent::Followup => ExplainOutput::Explanation {
            intent,
            topic: state.topic().to_string(),
            age: state.age(),
            explanation: state.safe_text()?.to_string(),
            example: state.example()?.to_string(),
            question: state.question()?.to_string(),
        },
    };
    Ok(output)
}
