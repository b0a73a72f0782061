//! Turns an engine result into the externally visible completion object.

use std::time::{SystemTime, UNIX_EPOCH};

use parley_core::{GenerationResult, Message, ParleyError, RenderedPrompt, Result};

use crate::api::types::{Choice, CompletionResponse, FinishReason, Usage, Verbose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `/chat/completions`: choice carries an assistant message.
    Chat,
    /// `/completions`: choice carries plain text.
    Completion,
}

impl RequestKind {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            RequestKind::Chat => "chatcmpl-",
            RequestKind::Completion => "cmpl-",
        }
    }

    pub fn object(&self) -> &'static str {
        match self {
            RequestKind::Chat => "chat.completion",
            RequestKind::Completion => "text_completion",
        }
    }
}

/// Build the response for one finished generation.
///
/// Token counts are copied from the engine as-is. With `verbose`, the exact
/// rendered prompt is echoed under `__verbose.prompt`.
pub fn assemble(
    kind: RequestKind,
    model_name: &str,
    generation: GenerationResult,
    rendered: &RenderedPrompt,
    verbose: bool,
) -> Result<CompletionResponse> {
    if model_name.is_empty() {
        return Err(ParleyError::InvalidModelName);
    }

    let finish_reason = FinishReason::from(generation.stop_cause);
    let usage = Usage {
        prompt_tokens: generation.prompt_token_count,
        completion_tokens: generation.completion_token_count,
        total_tokens: generation.prompt_token_count + generation.completion_token_count,
    };

    let verbose = verbose.then(|| Verbose {
        prompt: rendered.text.clone(),
        content: generation.text.clone(),
        stop_cause: generation.stop_cause,
        tokens_evaluated: generation.prompt_token_count,
        tokens_predicted: generation.completion_token_count,
        leading_special_token_included: rendered.leading_special_token_included,
    });

    let (message, text) = match kind {
        RequestKind::Chat => (Some(Message::assistant(generation.text)), None),
        RequestKind::Completion => (None, Some(generation.text)),
    };

    Ok(CompletionResponse {
        id: format!("{}{}", kind.id_prefix(), uuid::Uuid::new_v4().simple()),
        object: kind.object(),
        created: unix_now(),
        model: model_name.to_string(),
        choices: vec![Choice {
            index: 0,
            message,
            text,
            finish_reason,
        }],
        usage,
        verbose,
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
