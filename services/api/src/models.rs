//! API Models
//!
//! Request and response bodies for the REST API, annotated with `utoipa` for
//! OpenAPI generation. Core types that carry no schema are documented as
//! plain strings or objects.

use eli10_core::{
    Intent, Mode, SessionInput,
    quiz::{AnswerEvaluation, Difficulty, QuizGeneration, QuizQuestion},
    text::DisplaySections,
    topic_packs::TopicPacks,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct ExplainRequest {
    #[schema(example = "gravity")]
    pub topic: String,
    #[schema(example = 10)]
    pub age: u32,
    /// Prior conversation, used to tell answers apart from new questions.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    #[schema(value_type = String, example = "explain")]
    pub mode: Mode,
}

impl From<ExplainRequest> for SessionInput {
    fn from(req: ExplainRequest) -> Self {
        SessionInput::new(req.topic, req.age)
            .with_context(req.context)
            .with_mode(req.mode)
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ExplainResponse {
    #[schema(value_type = String, example = "new_question")]
    pub intent: Intent,
    /// Section label (`Explanation`, `Example`, `Question`, `Feedback`) to text.
    #[schema(value_type = Object)]
    pub sections: DisplaySections,
    /// Absent when speech could not be produced.
    #[schema(example = "/audio/3f2b1c9e.mp3")]
    pub audio_url: Option<String>,
}

fn default_num_questions() -> u32 {
    eli10_core::quiz::DEFAULT_QUESTIONS
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct QuizGenerateRequest {
    #[schema(example = "volcanoes")]
    pub topic: String,
    #[schema(example = 10)]
    pub age: u32,
    #[serde(default = "default_num_questions")]
    #[schema(example = 5, minimum = 1, maximum = 10)]
    pub num_questions: u32,
    #[serde(default)]
    #[schema(value_type = String, example = "medium")]
    pub difficulty: Difficulty,
}

/// Generated questions, or the raw model reply when it could not be parsed.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum QuizGenerateResponse {
    Questions {
        topic: String,
        #[schema(value_type = Vec<Object>)]
        questions: Vec<QuizQuestion>,
    },
    Diagnostic {
        error: String,
        raw_output: String,
    },
}

impl From<QuizGeneration> for QuizGenerateResponse {
    fn from(generation: QuizGeneration) -> Self {
        match generation {
            QuizGeneration::Questions { topic, questions } => Self::Questions { topic, questions },
            QuizGeneration::Diagnostic { error, raw_output } => {
                Self::Diagnostic { error, raw_output }
            }
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct QuizEvaluateRequest {
    #[schema(value_type = Object)]
    pub question: QuizQuestion,
    /// Option label chosen by the learner.
    #[schema(example = "B")]
    pub answer: String,
    #[schema(example = 10)]
    pub age: u32,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct QuizEvaluateResponse {
    pub is_correct: bool,
    pub feedback: String,
    pub used_fallback: bool,
}

impl From<AnswerEvaluation> for QuizEvaluateResponse {
    fn from(evaluation: AnswerEvaluation) -> Self {
        Self {
            is_correct: evaluation.is_correct,
            feedback: evaluation.feedback,
            used_fallback: evaluation.used_fallback,
        }
    }
}

/// Pack name to suggested topics.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(transparent)]
pub struct TopicsResponse(pub BTreeMap<String, Vec<String>>);

impl From<&TopicPacks> for TopicsResponse {
    fn from(packs: &TopicPacks) -> Self {
        Self(packs.packs().clone())
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
