//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the pipeline and the
//! collaborators every handler shares.

use crate::config::Config;
use eli10_core::{
    ExplainPipeline, quiz::QuizService, topic_packs::TopicPacks, tts::SpeechSynthesizer,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ExplainPipeline,
    pub quiz: Arc<QuizService>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub topic_packs: Arc<TopicPacks>,
    pub config: Arc<Config>,
}
