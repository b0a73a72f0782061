//! Registry of a model's reserved tokens and their literal text.

use std::collections::BTreeMap;

use parley_core::{token_literal, ParleyError, Result};
use serde::{Deserialize, Serialize};

pub const BOS: &str = "bos";
pub const EOS: &str = "eos";
pub const ROLE_START: &str = "role_start";
pub const ROLE_END: &str = "role_end";

/// Named special tokens for one model profile. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialTokens {
    tokens: BTreeMap<String, String>,
}

impl SpecialTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, literal: impl Into<String>) -> Self {
        self.insert(name, literal);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, literal: impl Into<String>) {
        self.tokens.insert(name.into(), literal.into());
    }

    /// Literal text of the token called `name`.
    pub fn resolve(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ParleyError::UnknownTokenKind(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(String::as_str)
    }

    /// Overlay `bos_token` / `eos_token` from a Hugging Face
    /// `tokenizer_config.json`. Either may be a string or `{"content": ...}`.
    pub fn overlay_tokenizer_config(&mut self, config: &serde_json::Value) {
        for (key, name) in [("bos_token", BOS), ("eos_token", EOS)] {
            if let Some(literal) = config.get(key).and_then(token_literal) {
                self.insert(name, literal);
            }
        }
    }
}
