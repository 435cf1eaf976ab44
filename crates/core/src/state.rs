//! Session input and the accumulating pipeline state.
//!
//! Each field of `PipelineState` is written exactly once by the stage that owns
//! it. Writes go through `PipelineState::apply`, reads through the typed
//! accessors, and both fail loudly when the graph ordering is violated.

use crate::{error::PipelineError, format::ExplainOutput, graph::StageName, intent::Intent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the learner asked the service to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Explain,
    Quiz,
}

/// The immutable request that starts a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInput {
    /// The topic to explain, or the learner's answer when replying to a question.
    pub topic: String,
    pub age: u32,
    /// Prior conversation rendered as text. Empty for a fresh chat.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub mode: Mode,
}

impl SessionInput {
    pub fn new(topic: impl Into<String>, age: u32) -> Self {
        Self {
            topic: topic.into(),
            age,
            context: String::new(),
            mode: Mode::Explain,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Names of the write-once state fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Intent,
    Simplified,
    Example,
    SafeText,
    Question,
    Feedback,
    Output,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Intent => "intent",
            Field::Simplified => "simplified",
            Field::Example => "example",
            Field::SafeText => "safe_text",
            Field::Question => "question",
            Field::Feedback => "feedback",
            Field::Output => "output",
        };
        f.write_str(name)
    }
}

/// The incremental result of one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Intent(Intent),
    Simplified(String),
    Example(String),
    SafeText(String),
    Question(String),
    Feedback(String),
    Output(ExplainOutput),
}

impl StageUpdate {
    pub fn field(&self) -> Field {
        match self {
            StageUpdate::Intent(_) => Field::Intent,
            StageUpdate::Simplified(_) => Field::Simplified,
            StageUpdate::Example(_) => Field::Example,
            StageUpdate::SafeText(_) => Field::SafeText,
            StageUpdate::Question(_) => Field::Question,
            StageUpdate::Feedback(_) => Field::Feedback,
            StageUpdate::Output(_) => Field::Output,
        }
    }
}

/// State owned by a single pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineState {
    input: SessionInput,
    intent: Option<Intent>,
    simplified: Option<String>,
    example: Option<String>,
    safe_text: Option<String>,
    question: Option<String>,
    feedback: Option<String>,
    output: Option<ExplainOutput>,
    executed: Vec<StageName>,
}

fn fill<T>(slot: &mut Option<T>, value: T, field: Field) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::FieldAlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

fn require<T>(slot: &Option<T>, field: Field) -> Result<&T, PipelineError> {
    slot.as_ref().ok_or(PipelineError::MissingField(field))
}

impl PipelineState {
    pub fn new(input: SessionInput) -> Self {
        Self {
            input,
            intent: None,
            simplified: None,
            example: None,
            safe_text: None,
            question: None,
            feedback: None,
            output: None,
            executed: Vec::new(),
        }
    }

    pub fn input(&self) -> &SessionInput {
        &self.input
    }

    pub fn topic(&self) -> &str {
        &self.input.topic
    }

    pub fn age(&self) -> u32 {
        self.input.age
    }

    pub fn context(&self) -> &str {
        &self.input.context
    }

    /// Merges a stage's output into the state.
    pub fn apply(&mut self, update: StageUpdate) -> Result<(), PipelineError> {
        let field = update.field();
        match update {
            StageUpdate::Intent(v) => fill(&mut self.intent, v, field),
            StageUpdate::Simplified(v) => fill(&mut self.simplified, v, field),
            StageUpdate::Example(v) => fill(&mut self.example, v, field),
            StageUpdate::SafeText(v) => fill(&mut self.safe_text, v, field),
            StageUpdate::Question(v) => fill(&mut self.question, v, field),
            StageUpdate::Feedback(v) => fill(&mut self.feedback, v, field),
            StageUpdate::Output(v) => fill(&mut self.output, v, field),
        }
    }

    pub fn intent(&self) -> Result<Intent, PipelineError> {
        require(&self.intent, Field::Intent).copied()
    }

    pub fn simplified(&self) -> Result<&str, PipelineError> {
        require(&self.simplified, Field::Simplified).map(String::as_str)
    }

    pub fn example(&self) -> Result<&str, PipelineError> {
        require(&self.example, Field::Example).map(String::as_str)
    }

    pub fn safe_text(&self) -> Result<&str, PipelineError> {
        require(&self.safe_text, Field::SafeText).map(String::as_str)
    }

    pub fn question(&self) -> Result<&str, PipelineError> {
        require(&self.question, Field::Question).map(String::as_str)
    }

    pub fn feedback(&self) -> Result<&str, PipelineError> {
        require(&self.feedback, Field::Feedback).map(String::as_str)
    }

    pub fn into_output(self) -> Result<ExplainOutput, PipelineError> {
        self.output.ok_or(PipelineError::MissingField(Field::Output))
    }

    /// Stages in the order they ran.
    pub fn executed(&self) -> &[StageName] {
        &self.executed
    }

    pub(crate) fn record_stage(&mut self, stage: StageName) {
        self.executed.push(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PipelineState {
        PipelineState::new(SessionInput::new("gravity", 8))
    }

    #[test]
    fn test_session_input_defaults() {
        let input: SessionInput = serde_json::from_str(r#"{"topic":"gravity","age":8}"#).unwrap();
        assert_eq!(input.context, "");
        assert_eq!(input.mode, Mode::Explain);
        assert_eq!(input, SessionInput::new("gravity", 8));
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let input: SessionInput =
            serde_json::from_str(r#"{"topic":"plants","age":10,"mode":"quiz"}"#).unwrap();
        assert_eq!(input.mode, Mode::Quiz);
    }

    #[test]
    fn test_field_written_once() {
        let mut s = state();
        s.apply(StageUpdate::Simplified("Things fall down.".into()))
            .unwrap();
        let err = s
            .apply(StageUpdate::Simplified("Again.".into()))
            .unwrap_err();
        assert_eq!(err, PipelineError::FieldAlreadySet(Field::Simplified));
        assert_eq!(s.simplified().unwrap(), "Things fall down.");
    }

    #[test]
    fn test_read_before_write_is_an_error() {
        let s = state();
        assert_eq!(
            s.safe_text().unwrap_err(),
            PipelineError::MissingField(Field::SafeText)
        );
        assert_eq!(
            s.intent().unwrap_err().to_string(),
            "State field 'intent' was read before the stage producing it ran"
        );
    }

    #[test]
    fn test_input_accessors() {
        let s = PipelineState::new(SessionInput::new("volcanoes", 12).with_context("User: hi"));
        assert_eq!(s.topic(), "volcanoes");
        assert_eq!(s.age(), 12);
        assert_eq!(s.context(), "User: hi");
        assert!(s.executed().is_empty());
    }
}
