//! Stage functions.
//!
//! Each stage reads what it needs from `PipelineState`, makes at most one model
//! call, and returns a single `StageUpdate`. Stages never write to the state
//! themselves; the executor merges their updates.
//!
//! The same functions serve both the blocking and the streaming run. When a
//! `StageContext` carries an emitter, sectioned model calls stream their
//! fragments to the consumer as they arrive.

use crate::{
    error::PipelineError,
    events::{PipelineEvent, Section},
    format::format_output,
    graph::StageName,
    intent::{Intent, IntentClassifier},
    llm_client::{LLMClient, LLMStreamEvent},
    prompts::{PromptKey, PromptLibrary, complexity_rules},
    state::{PipelineState, StageUpdate},
    text::clean_safety_output,
};
use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of a streaming run.
#[derive(Debug, Clone)]
pub(crate) struct Emitter {
    tx: mpsc::Sender<Result<PipelineEvent>>,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<Result<PipelineEvent>>) -> Self {
        Self { tx }
    }

    /// Fails with `ReceiverDropped` once the consumer has gone away.
    pub(crate) async fn emit(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        self.tx
            .send(Ok(event))
            .await
            .map_err(|_| PipelineError::ReceiverDropped)
    }
}

/// Collaborators shared by every stage of one run.
pub(crate) struct StageContext<'a> {
    pub llm: &'a dyn LLMClient,
    pub prompts: &'a PromptLibrary,
    pub classifier: &'a dyn IntentClassifier,
    pub emitter: Option<&'a Emitter>,
}

impl StageContext<'_> {
    async fn emit(&self, event: PipelineEvent) -> Result<()> {
        if let Some(emitter) = self.emitter {
            emitter.emit(event).await?;
        }
        Ok(())
    }

    /// One model call whose output belongs to `section`.
    ///
    /// Streams fragments when running with an emitter, otherwise waits for
    /// the complete reply. Returns the trimmed full text either way.
    async fn generate(&self, section: Section, prompt: &str) -> Result<String> {
        let Some(emitter) = self.emitter else {
            return Ok(self.llm.complete(prompt).await?.trim().to_string());
        };

        emitter.emit(PipelineEvent::Section { section }).await?;
        let mut stream = self.llm.stream(prompt).await?;
        let mut text = String::new();
        let mut fragments = 0usize;
        while let Some(event) = stream.next().await {
            let LLMStreamEvent::TextChunk(chunk) = event?;
            text.push_str(&chunk);
            fragments += 1;
            emitter
                .emit(PipelineEvent::Content {
                    section,
                    text: chunk,
                })
                .await?;
        }
        debug!(%section, fragments, "Section streamed");
        Ok(text.trim().to_string())
    }
}

pub(crate) async fn run_stage(
    stage: StageName,
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageUpdate> {
    match stage {
        StageName::InferIntent => infer_intent(ctx, state).await,
        StageName::Simplify => simplify(ctx, state).await,
        StageName::Example => example(ctx, state).await,
        StageName::Safety => safety(ctx, state).await,
        StageName::Question => question(ctx, state).await,
        StageName::Evaluate => evaluate_answer(ctx, state).await,
        StageName::Format => Ok(StageUpdate::Output(format_output(state)?)),
    }
}

async fn infer_intent(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    let intent = ctx
        .classifier
        .classify(state.topic(), state.context())
        .await?;
    ctx.emit(PipelineEvent::Intent { intent }).await?;
    Ok(StageUpdate::Intent(intent))
}

pub fn simplify_prompt(prompts: &PromptLibrary, state: &PipelineState) -> String {
    let age = state.age().to_string();
    prompts.render(
        PromptKey::Simplify,
        &[
            ("topic", state.topic()),
            ("age", &age),
            ("complexity_rules", &complexity_rules(state.age())),
        ],
    )
}

async fn simplify(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    let prompt = simplify_prompt(ctx.prompts, state);
    let text = ctx.generate(Section::Explanation, &prompt).await?;
    Ok(StageUpdate::Simplified(text))
}

pub fn example_prompt(
    prompts: &PromptLibrary,
    state: &PipelineState,
) -> Result<String, PipelineError> {
    let age = state.age().to_string();
    Ok(prompts.render(
        PromptKey::Example,
        &[("age", &age), ("simplified", state.simplified()?)],
    ))
}

async fn example(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    let prompt = example_prompt(ctx.prompts, state)?;
    let text = ctx.generate(Section::Example, &prompt).await?;
    Ok(StageUpdate::Example(text))
}

pub fn safety_prompt(
    prompts: &PromptLibrary,
    state: &PipelineState,
) -> Result<String, PipelineError> {
    let age = state.age().to_string();
    Ok(prompts.render(
        PromptKey::Safety,
        &[
            ("age", &age),
            ("simplified", state.simplified()?),
            ("example", state.example()?),
        ],
    ))
}

/// Safety refinement. Always a single blocking call, even when streaming.
///
/// While streaming, an `Update` replaces the explanation already on screen
/// when the cleaned rewrite differs from it.
async fn safety(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    let prompt = safety_prompt(ctx.prompts, state)?;
    let safe_text = ctx.llm.complete(&prompt).await?.trim().to_string();

    if ctx.emitter.is_some() {
        if let Some(text) = explanation_update(state.simplified()?, &safe_text) {
            ctx.emit(PipelineEvent::Update {
                section: Section::Explanation,
                text,
            })
            .await?;
        }
    }
    Ok(StageUpdate::SafeText(safe_text))
}

/// The replacement explanation to send, if any.
pub fn explanation_update(simplified: &str, safe_text: &str) -> Option<String> {
    if safe_text.is_empty() || safe_text == simplified {
        return None;
    }
    let cleaned = clean_safety_output(safe_text);
    (cleaned != simplified).then_some(cleaned)
}

/// Builds the question prompt from the safety rewrite, or from the first
/// simplification when the rewrite came back empty.
pub fn question_prompt(
    prompts: &PromptLibrary,
    state: &PipelineState,
) -> Result<String, PipelineError> {
    let age = state.age().to_string();
    let safe_text = state.safe_text()?;
    let basis = if safe_text.is_empty() {
        state.simplified()?
    } else {
        safe_text
    };
    Ok(prompts.render(
        PromptKey::Question,
        &[("age", &age), ("safe_text", basis)],
    ))
}

async fn question(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    let prompt = question_prompt(ctx.prompts, state)?;
    let text = ctx.generate(Section::Question, &prompt).await?;
    Ok(StageUpdate::Question(text))
}

pub fn evaluate_prompt(prompts: &PromptLibrary, state: &PipelineState) -> String {
    let age = state.age().to_string();
    prompts.render(
        PromptKey::EvaluateAnswer,
        &[
            ("age", &age),
            ("context", state.context()),
            ("topic", state.topic()),
        ],
    )
}

async fn evaluate_answer(ctx: &StageContext<'_>, state: &PipelineState) -> Result<StageUpdate> {
    debug_assert_eq!(state.intent().ok(), Some(Intent::Answer));
    let prompt = evaluate_prompt(ctx.prompts, state);
    let text = ctx.generate(Section::Feedback, &prompt).await?;
    Ok(StageUpdate::Feedback(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intent::LexicalIntentClassifier, llm_client::MockLLMClient, state::SessionInput};

    fn state_for(age: u32) -> PipelineState {
        PipelineState::new(SessionInput::new("gravity", age))
    }

    #[test]
    fn test_simplify_prompt_tiers() {
        let prompts = PromptLibrary::default();
        let young = simplify_prompt(&prompts, &state_for(8));
        assert!(young.contains(r#"Explain "gravity" for someone who is 8 years old."#));
        assert!(young.contains("short sentences"));
        assert!(!young.contains("{complexity_rules}"));

        let teen = simplify_prompt(&prompts, &state_for(15));
        assert!(teen.contains("moderate detail"));
        assert!(!teen.contains("short sentences"));

        let adult = simplify_prompt(&prompts, &state_for(30));
        assert!(adult.contains("concise"));
        assert!(adult.contains("jargon is fine"));
    }

    #[test]
    fn test_downstream_prompts_need_upstream_fields() {
        let prompts = PromptLibrary::default();
        let state = state_for(8);
        assert!(example_prompt(&prompts, &state).is_err());
        assert!(safety_prompt(&prompts, &state).is_err());
        assert!(question_prompt(&prompts, &state).is_err());
    }

    #[test]
    fn test_question_prompt_falls_back_to_simplified() {
        let prompts = PromptLibrary::default();
        let mut state = state_for(8);
        state
            .apply(StageUpdate::Simplified("Things fall down.".into()))
            .unwrap();
        state.apply(StageUpdate::SafeText(String::new())).unwrap();
        let prompt = question_prompt(&prompts, &state).unwrap();
        assert!(prompt.contains("Based on:\nThings fall down."));
    }

    #[test]
    fn test_explanation_update_rules() {
        assert_eq!(explanation_update("Same text.", "Same text."), None);
        assert_eq!(explanation_update("Original.", ""), None);
        assert_eq!(
            explanation_update("Original.", "Note: softened.\nLet's talk about rain."),
            Some("Let's talk about rain.".to_string())
        );
        // Differs raw, but identical once cleaned.
        assert_eq!(
            explanation_update("Let's talk about rain.", "Intro\nLet's talk about rain."),
            None
        );
    }

    #[tokio::test]
    async fn test_blocking_stage_trims_output() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("  Gravity pulls things down.\n".to_string()));
        let prompts = PromptLibrary::default();
        let ctx = StageContext {
            llm: &mock,
            prompts: &prompts,
            classifier: &LexicalIntentClassifier,
            emitter: None,
        };
        let update = run_stage(StageName::Simplify, &ctx, &state_for(8))
            .await
            .unwrap();
        assert_eq!(
            update,
            StageUpdate::Simplified("Gravity pulls things down.".into())
        );
    }

    #[tokio::test]
    async fn test_safety_without_emitter_sends_nothing() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|prompt| prompt.contains("Ensure this is SAFE"))
            .times(1)
            .returning(|_| Ok("Let's talk about falling.".to_string()));
        mock.expect_stream().times(0);
        let prompts = PromptLibrary::default();
        let ctx = StageContext {
            llm: &mock,
            prompts: &prompts,
            classifier: &LexicalIntentClassifier,
            emitter: None,
        };
        let mut state = state_for(8);
        state.apply(StageUpdate::Simplified("Falling.".into())).unwrap();
        state.apply(StageUpdate::Example("Apples.".into())).unwrap();
        let update = run_stage(StageName::Safety, &ctx, &state).await.unwrap();
        assert_eq!(
            update,
            StageUpdate::SafeText("Let's talk about falling.".into())
        );
    }
}
