//! OpenAI-compatible API types for chat and text completions.

use serde::{Deserialize, Deserializer, Serialize};

use parley_core::{
    ChatRequest, GenerationParams, Message, ParleyError, PromptInput, Result, StopCause,
};

fn default_add_special() -> bool {
    true
}

/// Body of `POST /v1/chat/completions`.
///
/// Carries either `messages` or a pre-formatted `prompt`, never both.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Allow the begin-of-sequence token to be injected.
    #[serde(default = "default_add_special")]
    pub add_special: bool,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_stop")]
    pub stop: Option<Vec<String>>,
}

impl ChatCompletionRequest {
    pub fn generation_params(&self, default_max_tokens: usize) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(default_max_tokens),
            stop: self.stop.clone().unwrap_or_default(),
        }
    }

    /// Resolve the input mode. Both inputs is a conflict; neither is invalid.
    pub fn into_chat_request(self) -> Result<ChatRequest> {
        let input = match (self.messages, self.prompt) {
            (Some(_), Some(_)) => return Err(ParleyError::ConflictingInputMode),
            (Some(messages), None) => PromptInput::Messages(messages),
            (None, Some(prompt)) => PromptInput::Raw(prompt),
            (None, None) => {
                return Err(ParleyError::InvalidRequest(
                    "one of `messages` or `prompt` is required".into(),
                ))
            }
        };
        Ok(ChatRequest {
            input,
            add_special: self.add_special,
        })
    }
}

/// Body of `POST /v1/completions`.
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
    #[serde(default = "default_add_special")]
    pub add_special: bool,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_stop")]
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn generation_params(&self, default_max_tokens: usize) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(default_max_tokens),
            stop: self.stop.clone().unwrap_or_default(),
        }
    }

    pub fn into_chat_request(self) -> ChatRequest {
        ChatRequest::raw(self.prompt, self.add_special)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

impl From<StopCause> for FinishReason {
    fn from(cause: StopCause) -> Self {
        match cause {
            StopCause::Length => FinishReason::Length,
            StopCause::StopString | StopCause::EndOfSequence => FinishReason::Stop,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    #[serde(rename = "__verbose", skip_serializing_if = "Option::is_none")]
    pub verbose: Option<Verbose>,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: usize,
    /// Set for chat completions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Set for text completions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Diagnostic echo of what the engine actually saw.
#[derive(Debug, Serialize)]
pub struct Verbose {
    pub prompt: String,
    pub content: String,
    pub stop_cause: StopCause,
    pub tokens_evaluated: usize,
    pub tokens_predicted: usize,
    pub leading_special_token_included: bool,
}

/// Deserialize `stop` as either a single string or an array of strings.
/// OpenAI allows both `"stop": "\n"` and `"stop": ["\n", "END"]`.
fn deserialize_stop<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StopField {
        Single(String),
        Multiple(Vec<String>),
    }

    let opt: Option<StopField> = Option::deserialize(deserializer)?;
    Ok(opt.map(|sf| match sf {
        StopField::Single(s) => vec![s],
        StopField::Multiple(v) => v,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn messages_mode() {
        let req = parse(serde_json::json!({
            "model": "llama2",
            "max_tokens": 16,
            "messages": [{"role": "user", "content": "hi"}],
        }));
        assert_eq!(req.generation_params(128).max_tokens, 16);
        let chat = req.into_chat_request().unwrap();
        assert!(chat.add_special);
        assert_eq!(chat.input, PromptInput::Messages(vec![Message::user("hi")]));
    }

    #[test]
    fn raw_mode_honours_add_special() {
        let chat = parse(serde_json::json!({"prompt": "[INST] hi [/INST]", "add_special": false}))
            .into_chat_request()
            .unwrap();
        assert_eq!(chat, ChatRequest::raw("[INST] hi [/INST]", false));
    }

    #[test]
    fn both_inputs_conflict() {
        let err = parse(serde_json::json!({
            "prompt": "x",
            "messages": [{"role": "user", "content": "y"}],
        }))
        .into_chat_request()
        .unwrap_err();
        assert!(matches!(err, ParleyError::ConflictingInputMode));
    }

    #[test]
    fn no_input_is_invalid() {
        let err = parse(serde_json::json!({"model": "m"}))
            .into_chat_request()
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidRequest(_)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let res = serde_json::from_value::<ChatCompletionRequest>(serde_json::json!({
            "messages": [{"role": "tool", "content": "y"}],
        }));
        assert!(res.is_err());
    }

    #[test]
    fn stop_accepts_string_or_array() {
        let single = parse(serde_json::json!({"prompt": "x", "stop": "\n"}));
        assert_eq!(single.generation_params(8).stop, vec!["\n".to_string()]);
        let multi = parse(serde_json::json!({"prompt": "x", "stop": ["a", "b"]}));
        assert_eq!(multi.generation_params(8).stop.len(), 2);
        let none = parse(serde_json::json!({"prompt": "x"}));
        assert!(none.generation_params(8).stop.is_empty());
        assert_eq!(none.generation_params(8).max_tokens, 8);
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from(StopCause::Length), FinishReason::Length);
        assert_eq!(FinishReason::from(StopCause::StopString), FinishReason::Stop);
        assert_eq!(FinishReason::from(StopCause::EndOfSequence), FinishReason::Stop);
        assert_eq!(serde_json::to_value(FinishReason::Length).unwrap(), "length");
    }
}
