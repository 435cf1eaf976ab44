//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for explanations,
//! quizzes and topic packs. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use eli10_core::{
    Mode, PipelineEvent, PipelineEventStream, SessionInput,
    text::{DisplaySections, display_sections},
};
use futures_util::{Stream, StreamExt};
use std::{path::Path, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::{
    models::{
        ErrorResponse, ExplainRequest, ExplainResponse, QuizEvaluateRequest,
        QuizEvaluateResponse, QuizGenerateRequest, QuizGenerateResponse, TopicsResponse,
    },
    state::AppState,
};

/// Events queued between the forwarding task and the SSE response.
const SSE_BUFFER: usize = 32;

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn require_topic(topic: &str) -> Result<(), ApiError> {
    if topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic must not be empty".to_string()));
    }
    Ok(())
}

fn explain_input(req: ExplainRequest) -> Result<SessionInput, ApiError> {
    require_topic(&req.topic)?;
    if req.mode == Mode::Quiz {
        return Err(ApiError::BadRequest(
            "quiz mode is served by /quiz/generate".to_string(),
        ));
    }
    Ok(req.into())
}

fn audio_url(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    Some(format!("/audio/{}", file_name))
}

/// Speaks the sections and returns the public URL of the audio file.
///
/// Speech is best effort: a synthesis failure is logged and yields `None`.
async fn synthesize_audio(state: &AppState, sections: &DisplaySections) -> Option<String> {
    let speech = sections.speech_text();
    if speech.is_empty() {
        return None;
    }
    match state.tts.synthesize(&speech).await {
        Ok(path) => audio_url(&path),
        Err(e) => {
            warn!(error = ?e, "Speech synthesis failed; responding without audio");
            None
        }
    }
}

/// Explain a topic, or give feedback on an answer, in one response.
#[utoipa::path(
    post,
    path = "/explain",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Explanation or feedback with audio", body = ExplainResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn explain(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let input = explain_input(payload)?;
    let output = state.pipeline.run(input).await?;

    let sections = display_sections(&output);
    let audio_url = synthesize_audio(&state, &sections).await;
    info!(intent = %output.intent(), has_audio = audio_url.is_some(), "Explanation served");

    Ok(Json(ExplainResponse {
        intent: output.intent(),
        sections,
        audio_url,
    }))
}

/// Stream an explanation as server-sent events.
///
/// Each event's data is a JSON object tagged by `type`: `intent`, `section`,
/// `content`, `update`, then `audio` and `done`, or a final `error`.
#[utoipa::path(
    post,
    path = "/explain/stream",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Stream of pipeline events", content_type = "text/event-stream", body = String),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn explain_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExplainRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let input = explain_input(payload)?;
    let events = state.pipeline.run_streaming(input);

    let (tx, rx) = mpsc::channel(SSE_BUFFER);
    tokio::spawn(forward_events(state, events, tx));

    let stream = ReceiverStream::new(rx).map(|event: PipelineEvent| Event::default().json_data(event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Relays pipeline events to the client, then appends `audio` and `done`.
///
/// A pipeline fault becomes a final `error` event. Returning early drops the
/// pipeline stream, which stops the run.
pub(crate) async fn forward_events(
    state: Arc<AppState>,
    mut events: PipelineEventStream,
    tx: mpsc::Sender<PipelineEvent>,
) {
    let mut sections = DisplaySections::default();

    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                sections.apply_event(&event);
                if tx.send(event).await.is_err() {
                    debug!("Client disconnected mid-stream");
                    return;
                }
            }
            Err(e) => {
                error!(error = ?e, "Streaming explanation failed");
                let _ = tx
                    .send(PipelineEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }

    if let Some(url) = synthesize_audio(&state, &sections).await {
        if tx.send(PipelineEvent::Audio { url }).await.is_err() {
            return;
        }
    }
    let _ = tx.send(PipelineEvent::Done).await;
}

/// Generate a multiple-choice quiz.
#[utoipa::path(
    post,
    path = "/quiz/generate",
    request_body = QuizGenerateRequest,
    responses(
        (status = 200, description = "Quiz questions, or the raw reply when it could not be parsed", body = QuizGenerateResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn quiz_generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuizGenerateRequest>,
) -> Result<Json<QuizGenerateResponse>, ApiError> {
    require_topic(&payload.topic)?;
    let generation = state
        .quiz
        .generate(
            &payload.topic,
            payload.age,
            payload.num_questions,
            payload.difficulty,
        )
        .await?;
    Ok(Json(generation.into()))
}

/// Grade a quiz answer.
#[utoipa::path(
    post,
    path = "/quiz/evaluate",
    request_body = QuizEvaluateRequest,
    responses(
        (status = 200, description = "Verdict and feedback", body = QuizEvaluateResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn quiz_evaluate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuizEvaluateRequest>,
) -> Result<Json<QuizEvaluateResponse>, ApiError> {
    let evaluation = state
        .quiz
        .evaluate(&payload.question, &payload.answer, payload.age)
        .await?;
    Ok(Json(evaluation.into()))
}

/// List the suggested topic packs.
#[utoipa::path(
    get,
    path = "/topics",
    responses(
        (status = 200, description = "Pack name to topics", body = TopicsResponse)
    )
)]
pub async fn topics(State(state): State<Arc<AppState>>) -> Json<TopicsResponse> {
    Json(TopicsResponse::from(state.topic_packs.as_ref()))
}
