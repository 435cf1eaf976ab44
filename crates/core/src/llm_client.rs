//! Model Gateway
//!
//! Every pipeline stage talks to the language model through the `LLMClient`
//! trait. The concrete client is built once at startup and shared behind an
//! `Arc`; it only holds read-only configuration, so concurrent requests can
//! use it without locking.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, instrument};

/// Sampling temperature used for every call. Kept at zero so that the same
/// prompt yields the same text for the lifetime of the process.
pub const TEMPERATURE: f32 = 0.0;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A lazy, finite stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent>> + Send>>;

/// A generic text-completion client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends `prompt` and waits for the complete reply.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Sends `prompt` and returns the reply as a stream of fragments.
    ///
    /// The stream can only be consumed once; concatenating every chunk gives
    /// the same text a `complete` call would have returned.
    async fn stream(&self, prompt: &str) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "llama3.1:8b").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(
        &self,
        prompt: &str,
        stream: bool,
    ) -> Result<async_openai::types::CreateChatCompletionRequest> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(TEMPERATURE)
            .stream(stream)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    #[instrument(name = "llm_complete", skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.request(prompt, false)?;
        let response = self.client.chat().create(request).await?;

        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;

        debug!(chars = answer.len(), "LLM completion received");
        Ok(answer)
    }

    #[instrument(name = "llm_stream", skip_all, fields(model = %self.model))]
    async fn stream(&self, prompt: &str) -> Result<LLMStream> {
        let request = self.request(prompt, true)?;
        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let content = response.choices.first()?.delta.content.clone()?;
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(LLMStreamEvent::TextChunk(content)))
                    }
                }
                Err(e) => Some(Err(e.into())),
            }
        })))
    }
}
