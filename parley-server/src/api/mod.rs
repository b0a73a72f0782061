pub mod openai;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use self::openai::AppState;

/// All HTTP routes served by parley.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/chat/completions", post(openai::chat_completions))
        .route("/v1/completions", post(openai::completions))
        .route("/completions", post(openai::completions))
        .route("/v1/models", get(openai::list_models))
        .route("/health", get(openai::health))
        .with_state(state)
}
