//! Helpers for reading Hugging Face `tokenizer_config.json` documents.

use serde_json::Value;

/// Literal text of a token entry such as `bos_token` or `eos_token`.
/// The entry may be a plain string or an added-token object
/// (`{"content": "<s>", "lstrip": false, ...}`).
pub fn token_literal(value: &Value) -> Option<String> {
    value
        .as_str()
        .or_else(|| value.get("content").and_then(Value::as_str))
        .map(String::from)
}
