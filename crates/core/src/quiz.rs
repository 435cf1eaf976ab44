//! Multiple-choice quizzes.
//!
//! The model is asked for JSON, but replies are free text, so parsing is
//! permissive and a parse failure never fails the request: generation falls
//! back to a diagnostic payload carrying the raw reply, and evaluation falls
//! back to comparing option labels directly.

use crate::{
    error::QuizParseError,
    llm_client::LLMClient,
    prompts::{PromptKey, PromptLibrary},
};
use anyhow::Result;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{info, instrument, warn};

pub const DEFAULT_QUESTIONS: u32 = 5;
pub const MAX_QUESTIONS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Option label (`A`..`D`) to option text.
    pub options: BTreeMap<String, String>,
    /// Label of the correct option.
    pub correct: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuizPayload {
    Wrapped { questions: Vec<QuizQuestion> },
    Bare(Vec<QuizQuestion>),
}

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QuizGeneration {
    Questions {
        topic: String,
        questions: Vec<QuizQuestion>,
    },
    /// The reply could not be parsed; `raw_output` is what the model said.
    Diagnostic { error: String, raw_output: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub is_correct: bool,
    pub feedback: String,
    /// True when the model's verdict was unreadable and labels were compared.
    #[serde(default)]
    pub used_fallback: bool,
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    is_correct: bool,
    feedback: String,
}

/// Case-insensitive comparison of option labels, ignoring surrounding space.
pub fn labels_match(submitted: &str, correct: &str) -> bool {
    submitted.trim().eq_ignore_ascii_case(correct.trim())
}

/// Parses `text` as `T`, trying progressively looser extractions: the whole
/// text, a fenced code block, then the outermost `{...}` or `[...]` span.
pub fn parse_structured<T: DeserializeOwned>(
    text: &str,
    expected: &'static str,
) -> Result<T, QuizParseError> {
    let trimmed = text.trim();

    let mut last_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    if let Some(block) = extract_code_block(trimmed) {
        match serde_json::from_str::<T>(block) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) else {
            continue;
        };
        if end <= start {
            continue;
        }
        match serde_json::from_str::<T>(&trimmed[start..=end]) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(QuizParseError {
        expected,
        reason: last_error,
    })
}

/// Contents of the first ```` ```json ```` (or bare ```` ``` ````) block.
fn extract_code_block(text: &str) -> Option<&str> {
    for marker in ["```json", "```JSON", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end) = text[content_start..].find("```") {
                return Some(text[content_start..content_start + end].trim());
            }
        }
    }
    None
}

fn format_options(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(label, text)| format!("{label}: {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generates and grades quizzes with the shared model client.
pub struct QuizService {
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptLibrary>,
}

impl QuizService {
    pub fn new(llm: Arc<dyn LLMClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    /// Asks the model for `num_questions` questions, clamped to `1..=10`.
    #[instrument(skip(self), fields(questions))]
    pub async fn generate(
        &self,
        topic: &str,
        age: u32,
        num_questions: u32,
        difficulty: Difficulty,
    ) -> Result<QuizGeneration> {
        let num_questions = num_questions.clamp(1, MAX_QUESTIONS);
        let prompt = self.prompts.render(
            PromptKey::QuizGenerate,
            &[
                ("topic", topic),
                ("age", &age.to_string()),
                ("difficulty", &difficulty.to_string()),
                ("num_questions", &num_questions.to_string()),
            ],
        );
        let raw = self.llm.complete(&prompt).await?;

        let generation = match parse_structured::<QuizPayload>(&raw, "quiz questions") {
            Ok(QuizPayload::Wrapped { questions } | QuizPayload::Bare(questions)) => {
                tracing::Span::current().record("questions", questions.len());
                info!("Quiz generated");
                QuizGeneration::Questions {
                    topic: topic.to_string(),
                    questions,
                }
            }
            Err(e) => {
                warn!(error = %e, "Quiz output was not valid JSON; returning diagnostic");
                QuizGeneration::Diagnostic {
                    error: "Failed to parse quiz questions".to_string(),
                    raw_output: raw,
                }
            }
        };
        Ok(generation)
    }

    /// Grades `answer` (an option label) against `question`.
    #[instrument(skip(self, question), fields(correct = %question.correct))]
    pub async fn evaluate(
        &self,
        question: &QuizQuestion,
        answer: &str,
        age: u32,
    ) -> Result<AnswerEvaluation> {
        let prompt = self.prompts.render(
            PromptKey::QuizEvaluate,
            &[
                ("age", &age.to_string()),
                ("question", &question.question),
                ("options", &format_options(&question.options)),
                ("correct", &question.correct),
                ("answer", answer),
            ],
        );
        let raw = self.llm.complete(&prompt).await?;

        let evaluation = match parse_structured::<ModelVerdict>(&raw, "answer verdict") {
            Ok(verdict) => AnswerEvaluation {
                is_correct: verdict.is_correct,
                feedback: verdict.feedback,
                used_fallback: false,
            },
            Err(e) => {
                warn!(error = %e, "Verdict was not valid JSON; comparing labels");
                AnswerEvaluation {
                    is_correct: labels_match(answer, &question.correct),
                    feedback: question.explanation.clone(),
                    used_fallback: true,
                }
            }
        };
        Ok(evaluation)
    }
}
