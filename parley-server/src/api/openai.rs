//! OpenAI-compatible completion endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error, info};

use parley_core::{ChatRequest, GenerationParams, ParleyError};
use parley_runtime::EngineClient;

use crate::assembler::{assemble, RequestKind};
use crate::chat_template::TemplateContext;

use super::types::*;

/// Shared application state passed to handlers.
pub struct AppState {
    pub model_name: String,
    pub template: TemplateContext,
    pub engine: EngineClient,
    pub default_max_tokens: usize,
    /// Attach the `__verbose` diagnostic block to every response.
    pub verbose: bool,
}

/// Error body in the OpenAI shape: `{"error": {"message", "type"}}`.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl From<ParleyError> for ApiError {
    fn from(e: ParleyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            e if e.is_client_error() => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ParleyError::EngineUnavailable | ParleyError::Cancelled => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable_error")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({
            "error": { "message": self.0.to_string(), "type": kind }
        });
        (status, Json(body)).into_response()
    }
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let model = req.model.clone().unwrap_or_else(|| state.model_name.clone());
    let params = req.generation_params(state.default_max_tokens);
    let chat = req.into_chat_request()?;
    let response = complete(&state, RequestKind::Chat, &model, &chat, params).await?;
    Ok(Json(response))
}

/// POST /v1/completions
pub async fn completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let model = req.model.clone().unwrap_or_else(|| state.model_name.clone());
    let params = req.generation_params(state.default_max_tokens);
    let chat = req.into_chat_request();
    let response = complete(&state, RequestKind::Completion, &model, &chat, params).await?;
    Ok(Json(response))
}

/// Render, generate, assemble.
async fn complete(
    state: &AppState,
    kind: RequestKind,
    model: &str,
    chat: &ChatRequest,
    params: GenerationParams,
) -> Result<CompletionResponse, ParleyError> {
    let rendered = state.template.render(chat)?;

    let request_id = uuid::Uuid::new_v4().to_string();
    // Dropping `pending` (client disconnect) cancels the generation.
    let pending = state
        .engine
        .submit(request_id.clone(), rendered.text.clone(), params)
        .await?;
    debug!(request_id = pending.request_id(), "prompt queued");
    let generation = pending.wait().await?;

    let response = assemble(kind, model, generation, &rendered, state.verbose)?;
    info!(
        request_id = %request_id,
        id = %response.id,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        "completion served"
    );
    Ok(response)
}

/// GET /v1/models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": state.model_name,
            "object": "model",
            "owned_by": "parley",
            "template": state.template.name(),
        }]
    }))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok"
    }))
}
