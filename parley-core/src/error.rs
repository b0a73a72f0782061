use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("request supplies both `messages` and `prompt`")]
    ConflictingInputMode,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown special token kind: {0}")]
    UnknownTokenKind(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("model name must not be empty")]
    InvalidModelName,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("engine unavailable")]
    EngineUnavailable,

    #[error("request cancelled")]
    Cancelled,

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParleyError {
    /// Errors caused by the caller's input rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ParleyError::ConflictingInputMode
                | ParleyError::InvalidRequest(_)
                | ParleyError::InvalidModelName
        )
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
