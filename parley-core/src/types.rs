use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation role. Closed: anything else is rejected when a request is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The two mutually exclusive ways a caller can supply a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    /// Role-tagged conversation, formatted by the chat template.
    Messages(Vec<Message>),
    /// Caller-formatted prompt, passed through.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub input: PromptInput,
    /// Whether the begin-of-sequence literal may be injected.
    pub add_special: bool,
}

impl ChatRequest {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            input: PromptInput::Messages(messages),
            add_special: true,
        }
    }

    pub fn raw(prompt: impl Into<String>, add_special: bool) -> Self {
        Self {
            input: PromptInput::Raw(prompt.into()),
            add_special,
        }
    }
}

/// Prompt text exactly as handed to the generation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub text: String,
    pub leading_special_token_included: bool,
}

/// Why generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// Hit the `max_tokens` budget.
    Length,
    /// A caller-provided stop string appeared in the output.
    StopString,
    /// The model produced its end-of-sequence token.
    EndOfSequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 128,
            stop: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub stop_cause: StopCause,
    pub prompt_token_count: usize,
    pub completion_token_count: usize,
}
