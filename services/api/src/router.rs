//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, generated audio files, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, ExplainRequest, ExplainResponse, QuizEvaluateRequest,
        QuizEvaluateResponse, QuizGenerateRequest, QuizGenerateResponse, TopicsResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::explain,
        handlers::explain_stream,
        handlers::quiz_generate,
        handlers::quiz_evaluate,
        handlers::topics,
    ),
    components(
        schemas(ExplainRequest, ExplainResponse, QuizGenerateRequest, QuizGenerateResponse, QuizEvaluateRequest, QuizEvaluateResponse, TopicsResponse, ErrorResponse)
    ),
    tags(
        (name = "Explain Like I'm 10 API", description = "Age-appropriate explanations, quizzes and spoken audio")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let audio = ServeDir::new(&app_state.config.audio_dir);

    let api_router = Router::new()
        .route("/explain", post(handlers::explain))
        .route("/explain/stream", post(handlers::explain_stream))
        .route("/quiz/generate", post(handlers::quiz_generate))
        .route("/quiz/evaluate", post(handlers::quiz_evaluate))
        .route("/topics", get(handlers::topics))
        .nest_service("/audio", audio)
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/explain",
            "/explain/stream",
            "/quiz/generate",
            "/quiz/evaluate",
            "/topics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
