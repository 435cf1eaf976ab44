use thiserror::Error;

use crate::state::Field;

/// Conditions raised by the pipeline itself, as opposed to faults coming back
/// from the model gateway (those travel as plain `anyhow::Error`s).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("State field '{0}' was already populated")]
    FieldAlreadySet(Field),

    #[error("State field '{0}' was read before the stage producing it ran")]
    MissingField(Field),

    #[error("Stream consumer went away")]
    ReceiverDropped,
}

/// Structured quiz output could not be recovered from the model's reply.
#[derive(Error, Debug)]
#[error("Failed to parse model output as {expected}: {reason}")]
pub struct QuizParseError {
    pub expected: &'static str,
    pub reason: String,
}
