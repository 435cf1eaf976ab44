//! Main Entrypoint for the Explain Like I'm 10 API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the model client, prompt templates and topic packs.
//! 3. Building the explanation pipeline, quiz service and speech synthesizer.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use eli10_api::{config::Config, router::create_router, state::AppState};
use eli10_core::{
    ExplainPipeline, PromptLibrary,
    llm_client::{LLMClient, OpenAICompatibleClient},
    quiz::QuizService,
    topic_packs::TopicPacks,
    tts::GoogleTranslateTts,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let prompts = match &config.prompts_path {
        Some(path) => PromptLibrary::from_dir(path)
            .with_context(|| format!("Failed to load prompts from {}", path.display()))?,
        None => PromptLibrary::default(),
    };
    let prompts = Arc::new(prompts);
    let topic_packs = Arc::new(TopicPacks::load(config.topic_packs_path.as_deref())?);
    tokio::fs::create_dir_all(&config.audio_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.audio_dir.display()))?;

    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key())
        .with_api_base(&config.llm_base_url);
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let pipeline =
        ExplainPipeline::with_strategy(llm_client.clone(), prompts.clone(), config.intent_strategy);
    info!(classifier = pipeline.classifier_name(), "Explanation pipeline ready.");

    let app_state = Arc::new(AppState {
        pipeline,
        quiz: Arc::new(QuizService::new(llm_client, prompts)),
        tts: Arc::new(GoogleTranslateTts::new(
            config.audio_dir.clone(),
            config.tts_language.clone(),
        )),
        topic_packs,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        base_url = %config.llm_base_url,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
