//! Core of the "explain like I'm 10" service.
//!
//! An `ExplainPipeline` turns a topic and a reader's age into an
//! age-appropriate explanation, example and follow-up question, or, when the
//! reader is answering an earlier question, into feedback on that answer.
//! The HTTP service in `services/api` is a thin wrapper around this crate.

pub mod error;
pub mod events;
pub mod format;
pub mod graph;
pub mod intent;
pub mod llm_client;
pub mod pipeline;
pub mod prompts;
pub mod quiz;
mod stages;
pub mod state;
pub mod text;
pub mod topic_packs;
pub mod tts;

pub use error::PipelineError;
pub use events::{PipelineEvent, Section};
pub use format::ExplainOutput;
pub use intent::{Intent, IntentStrategy};
pub use pipeline::{ExplainPipeline, PipelineEventStream};
pub use prompts::PromptLibrary;
pub use stages::{
    evaluate_prompt, example_prompt, explanation_update, question_prompt, safety_prompt,
    simplify_prompt,
};
pub use state::{Mode, SessionInput};
