//! Intent classification strategies.
//!
//! Two interchangeable classifiers decide how the learner's latest input
//! relates to the conversation so far. `ModelIntentClassifier` asks the model;
//! `LexicalIntentClassifier` uses word-level heuristics and never calls the
//! model. Neither one can fail on ambiguous input: anything unrecognized is a
//! `NewQuestion`.

use crate::{
    llm_client::LLMClient,
    prompts::{PromptKey, PromptLibrary},
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// No prior context, or the input is unrelated to it.
    #[default]
    NewQuestion,
    /// The input responds to a question posed earlier in the conversation.
    Answer,
    /// The input extends the current topic.
    Followup,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::NewQuestion => "new_question",
            Intent::Answer => "answer",
            Intent::Followup => "followup",
        }
    }

    /// Maps a free-form model reply onto an intent.
    ///
    /// Precedence: "answer", then "followup"/"follow", else `NewQuestion`.
    pub fn from_model_reply(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        if reply.contains("answer") {
            Intent::Answer
        } else if reply.contains("followup") || reply.contains("follow") {
            Intent::Followup
        } else {
            Intent::NewQuestion
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks one of the two classifiers, e.g. from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntentStrategy {
    #[default]
    Model,
    Lexical,
}

impl FromStr for IntentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" | "llm" => Ok(IntentStrategy::Model),
            "lexical" | "heuristic" => Ok(IntentStrategy::Lexical),
            other => Err(format!("unknown intent strategy '{other}'")),
        }
    }
}

impl IntentStrategy {
    pub fn build(
        self,
        llm: Arc<dyn LLMClient>,
        prompts: Arc<PromptLibrary>,
    ) -> Arc<dyn IntentClassifier> {
        match self {
            IntentStrategy::Model => Arc::new(ModelIntentClassifier::new(llm, prompts)),
            IntentStrategy::Lexical => Arc::new(LexicalIntentClassifier),
        }
    }
}

/// Classifies the learner's latest input relative to prior context.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, topic: &str, context: &str) -> Result<Intent>;

    fn name(&self) -> &'static str;
}

/// Asks the model which of the three intents applies.
pub struct ModelIntentClassifier {
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptLibrary>,
}

impl ModelIntentClassifier {
    pub fn new(llm: Arc<dyn LLMClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl IntentClassifier for ModelIntentClassifier {
    async fn classify(&self, topic: &str, context: &str) -> Result<Intent> {
        if context.trim().is_empty() {
            return Ok(Intent::NewQuestion);
        }
        let prompt = self.prompts.render(
            PromptKey::InferIntent,
            &[("context", context), ("topic", topic)],
        );
        let reply = self.llm.complete(&prompt).await?;
        let intent = Intent::from_model_reply(&reply);
        debug!(reply = %reply.trim(), %intent, "Model classified intent");
        Ok(intent)
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

/// Marker the conversation context carries once a question has been posed.
pub const QUESTION_MARKER: &str = "question:";

/// Inputs at or above this many words are never treated as answers.
pub const MAX_ANSWER_WORDS: usize = 15;

const QUESTION_WORDS: [&str; 9] = [
    "what", "why", "how", "when", "where", "who", "whom", "whose", "which",
];

/// Cheap classifier that avoids a model round-trip.
///
/// Only distinguishes `Answer` from `NewQuestion`; it never yields `Followup`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalIntentClassifier;

impl LexicalIntentClassifier {
    pub fn classify_text(topic: &str, context: &str) -> Intent {
        if !context.to_lowercase().contains(QUESTION_MARKER) {
            return Intent::NewQuestion;
        }
        if topic.contains('?') {
            return Intent::NewQuestion;
        }
        let words: Vec<String> = topic
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .collect();
        if words.len() >= MAX_ANSWER_WORDS {
            return Intent::NewQuestion;
        }
        // Contractions count by their stem: "what's" is "what".
        let asks = words.iter().any(|w| {
            w.split(['\'', '’'])
                .next()
                .is_some_and(|stem| QUESTION_WORDS.contains(&stem))
        });
        if asks {
            return Intent::NewQuestion;
        }
        Intent::Answer
    }
}

#[async_trait]
impl IntentClassifier for LexicalIntentClassifier {
    async fn classify(&self, topic: &str, context: &str) -> Result<Intent> {
        Ok(Self::classify_text(topic, context))
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}
