//! Pipeline executor.
//!
//! `ExplainPipeline` walks the graph in `graph.rs` for one request at a time.
//! `run` blocks on each model call and returns the formatted output;
//! `run_streaming` drives the same stages on a spawned task and hands back a
//! stream of `PipelineEvent`s as fragments arrive.

use crate::{
    error::PipelineError,
    events::PipelineEvent,
    format::ExplainOutput,
    graph::StageName,
    intent::{IntentClassifier, IntentStrategy},
    llm_client::LLMClient,
    prompts::PromptLibrary,
    stages::{Emitter, StageContext, run_stage},
    state::{PipelineState, SessionInput},
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span};

/// Events buffered between the pipeline task and a slow consumer.
const STREAM_BUFFER: usize = 64;

/// Stream returned by `ExplainPipeline::run_streaming`.
pub type PipelineEventStream = ReceiverStream<Result<PipelineEvent>>;

/// The explanation workflow with its collaborators injected.
///
/// Cloning is cheap; clones share the same model client, classifier and
/// prompt templates.
#[derive(Clone)]
pub struct ExplainPipeline {
    llm: Arc<dyn LLMClient>,
    classifier: Arc<dyn IntentClassifier>,
    prompts: Arc<PromptLibrary>,
}

impl ExplainPipeline {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        classifier: Arc<dyn IntentClassifier>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        Self {
            llm,
            classifier,
            prompts,
        }
    }

    /// Builds a pipeline whose classifier is chosen by `strategy`.
    pub fn with_strategy(
        llm: Arc<dyn LLMClient>,
        prompts: Arc<PromptLibrary>,
        strategy: IntentStrategy,
    ) -> Self {
        let classifier = strategy.build(llm.clone(), prompts.clone());
        Self::new(llm, classifier, prompts)
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Runs the whole graph and returns the formatted output.
    pub async fn run(&self, input: SessionInput) -> Result<ExplainOutput> {
        let state = self.run_to_state(input).await?;
        Ok(state.into_output()?)
    }

    /// Runs the whole graph and returns the final state, including the list
    /// of stages that executed.
    pub async fn run_to_state(&self, input: SessionInput) -> Result<PipelineState> {
        let span = info_span!(
            "pipeline",
            mode = "blocking",
            topic = %input.topic,
            age = input.age,
            classifier = self.classifier.name()
        );
        async {
            let state = self.execute(input, None).await?;
            info!(stages = ?state.executed(), "Pipeline finished");
            Ok::<_, anyhow::Error>(state)
        }
        .instrument(span)
        .await
    }

    /// Starts the graph on a background task and streams its events.
    ///
    /// Must be called from within a tokio runtime. A model fault ends the
    /// stream with an `Err` item. Dropping the stream stops the run at its
    /// next emission.
    pub fn run_streaming(&self, input: SessionInput) -> PipelineEventStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pipeline = self.clone();
        let span = info_span!(
            "pipeline",
            mode = "streaming",
            topic = %input.topic,
            age = input.age,
            classifier = self.classifier.name()
        );

        tokio::spawn(
            async move {
                let emitter = Emitter::new(tx.clone());
                match pipeline.execute(input, Some(&emitter)).await {
                    Ok(state) => info!(stages = ?state.executed(), "Streaming pipeline finished"),
                    Err(e) if is_receiver_dropped(&e) => {
                        debug!("Stream consumer went away; stopping pipeline");
                    }
                    Err(e) => {
                        error!(error = ?e, "Streaming pipeline failed");
                        let _ = tx.send(Err(e)).await;
                    }
                }
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    async fn execute(&self, input: SessionInput, emitter: Option<&Emitter>) -> Result<PipelineState> {
        let ctx = StageContext {
            llm: self.llm.as_ref(),
            prompts: self.prompts.as_ref(),
            classifier: self.classifier.as_ref(),
            emitter,
        };
        let mut state = PipelineState::new(input);
        let mut current = Some(StageName::ENTRY);

        while let Some(stage) = current {
            debug!(%stage, "Running stage");
            let update = run_stage(stage, &ctx, &state)
                .instrument(info_span!("stage", name = %stage))
                .await?;
            state.apply(update)?;
            state.record_stage(stage);
            current = stage.next(&state)?;
        }
        Ok(state)
    }
}

fn is_receiver_dropped(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<PipelineError>(),
        Some(PipelineError::ReceiverDropped)
    )
}
